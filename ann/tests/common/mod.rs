//! In-process stand-in for `libann.so`, exported through the same C ABI.
//!
//! Model files are plain text:
//!
//! ```text
//! inputs = 1x3x4, 1x2
//! outputs = 1x3x4
//! ```
//!
//! A model whose contents are `fail` makes `load` return -1. Every output
//! element `j` is set to `2 * input0[j % input0.len()]`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int, c_ulong};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ann::sys::{AnnApi, AnnHandle};
use ann::{pack_shape, AnnLibrary};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Init {
        tag: String,
        log_level: i32,
        tuning_level: i32,
    },
    Load {
        tag: String,
        path: String,
        fast_math: bool,
        fp16: bool,
        save_cached_network: bool,
        cached_network_path: Option<String>,
    },
    Unload {
        tag: String,
        id: i32,
    },
    Execute {
        tag: String,
        id: i32,
    },
    Destroy {
        tag: String,
    },
}

static EVENTS: Mutex<Vec<Event>> = Mutex::new(Vec::new());

/// Events recorded by contexts created with tuning file `tag`.
pub fn events_for(tag: &Path) -> Vec<Event> {
    let tag = tag.to_string_lossy();
    EVENTS
        .lock()
        .unwrap()
        .iter()
        .filter(|event| event_tag(event) == tag)
        .cloned()
        .collect()
}

fn event_tag(event: &Event) -> &str {
    match event {
        Event::Init { tag, .. }
        | Event::Load { tag, .. }
        | Event::Unload { tag, .. }
        | Event::Execute { tag, .. }
        | Event::Destroy { tag } => tag,
    }
}

fn record(event: Event) {
    EVENTS.lock().unwrap().push(event);
}

struct FakeNetwork {
    inputs: Vec<Vec<usize>>,
    outputs: Vec<Vec<usize>>,
}

struct FakeRuntime {
    tag: String,
    next_id: c_int,
    networks: HashMap<c_int, FakeNetwork>,
}

unsafe fn string_arg(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

unsafe fn runtime<'a>(ann: AnnHandle) -> &'a mut FakeRuntime {
    &mut *(ann as *mut FakeRuntime)
}

unsafe extern "C" fn fake_init(
    log_level: c_int,
    tuning_level: c_int,
    tuning_file: *const c_char,
) -> AnnHandle {
    let tag = string_arg(tuning_file).unwrap_or_default();
    if tag.contains("null-context") {
        return std::ptr::null_mut();
    }
    record(Event::Init {
        tag: tag.clone(),
        log_level,
        tuning_level,
    });
    Box::into_raw(Box::new(FakeRuntime {
        tag,
        next_id: 0,
        networks: HashMap::new(),
    })) as AnnHandle
}

unsafe extern "C" fn fake_destroy(ann: AnnHandle) {
    if ann.is_null() {
        return;
    }
    let runtime = Box::from_raw(ann as *mut FakeRuntime);
    record(Event::Destroy { tag: runtime.tag });
}

unsafe extern "C" fn fake_load(
    ann: AnnHandle,
    path: *const c_char,
    fast_math: bool,
    fp16: bool,
    save_cached_network: bool,
    cached_network_path: *const c_char,
) -> c_int {
    let runtime = runtime(ann);
    let path = string_arg(path).unwrap_or_default();
    record(Event::Load {
        tag: runtime.tag.clone(),
        path: path.clone(),
        fast_math,
        fp16,
        save_cached_network,
        cached_network_path: string_arg(cached_network_path),
    });

    let Some(network) = std::fs::read_to_string(&path).ok().and_then(|s| parse_model(&s)) else {
        return -1;
    };
    let id = runtime.next_id;
    runtime.next_id += 1;
    runtime.networks.insert(id, network);
    id
}

unsafe extern "C" fn fake_unload(ann: AnnHandle, net_id: c_int) {
    let runtime = runtime(ann);
    runtime.networks.remove(&net_id);
    record(Event::Unload {
        tag: runtime.tag.clone(),
        id: net_id,
    });
}

unsafe extern "C" fn fake_execute(
    ann: AnnHandle,
    net_id: c_int,
    input_data: *const *const c_void,
    output_data: *const *mut c_void,
) {
    let runtime = runtime(ann);
    record(Event::Execute {
        tag: runtime.tag.clone(),
        id: net_id,
    });
    let network = &runtime.networks[&net_id];

    let first_input: &[f32] = match network.inputs.first() {
        Some(shape) => {
            let ptr = *input_data as *const f32;
            std::slice::from_raw_parts(ptr, shape.iter().product())
        }
        None => &[],
    };
    for (i, shape) in network.outputs.iter().enumerate() {
        let ptr = *output_data.add(i) as *mut f32;
        let output = std::slice::from_raw_parts_mut(ptr, shape.iter().product());
        for (j, value) in output.iter_mut().enumerate() {
            *value = if first_input.is_empty() {
                0.0
            } else {
                2.0 * first_input[j % first_input.len()]
            };
        }
    }
}

unsafe extern "C" fn fake_shape(ann: AnnHandle, net_id: c_int, is_input: bool, index: c_int) -> c_ulong {
    let network = &runtime(ann).networks[&net_id];
    let shapes = if is_input { &network.inputs } else { &network.outputs };
    pack_shape(&shapes[index as usize]).unwrap_or(0)
}

unsafe extern "C" fn fake_tensors(ann: AnnHandle, net_id: c_int, is_input: bool) -> c_int {
    let network = &runtime(ann).networks[&net_id];
    let count = if is_input {
        network.inputs.len()
    } else {
        network.outputs.len()
    };
    count as c_int
}

const FAKE_API: AnnApi = AnnApi {
    init: fake_init,
    destroy: fake_destroy,
    load: fake_load,
    unload: fake_unload,
    execute: fake_execute,
    shape: fake_shape,
    tensors: fake_tensors,
};

pub fn fake_library() -> Arc<AnnLibrary> {
    // SAFETY: the fake functions follow the adapter's contract and are
    // statically linked into the test binary.
    Arc::new(unsafe { AnnLibrary::from_api(FAKE_API) })
}

fn parse_model(contents: &str) -> Option<FakeNetwork> {
    let mut inputs = None;
    let mut outputs = None;
    for line in contents.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let shapes = parse_shapes(value.trim())?;
        match key.trim() {
            "inputs" => inputs = Some(shapes),
            "outputs" => outputs = Some(shapes),
            _ => return None,
        }
    }
    Some(FakeNetwork {
        inputs: inputs?,
        outputs: outputs?,
    })
}

fn parse_shapes(value: &str) -> Option<Vec<Vec<usize>>> {
    if value.is_empty() {
        return Some(Vec::new());
    }
    value
        .split(',')
        .map(|shape| {
            shape
                .trim()
                .split('x')
                .map(|d| d.parse::<usize>().ok())
                .collect::<Option<Vec<usize>>>()
        })
        .collect()
}

fn format_shapes(shapes: &[&[usize]]) -> String {
    shapes
        .iter()
        .map(|shape| {
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("x")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes a fake model file describing its bindings.
pub fn write_model(dir: &Path, name: &str, inputs: &[&[usize]], outputs: &[&[usize]]) -> PathBuf {
    let path = dir.join(name);
    let contents = format!(
        "inputs = {}\noutputs = {}\n",
        format_shapes(inputs),
        format_shapes(outputs)
    );
    std::fs::write(&path, contents).unwrap();
    path
}

/// Writes a model the fake adapter refuses to load.
pub fn write_broken_model(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "fail").unwrap();
    path
}

/// Creates an empty tuning file; its path tags the context's events.
pub fn tuning_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}
