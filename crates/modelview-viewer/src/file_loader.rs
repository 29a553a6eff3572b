//! Model loading from URL, local file upload and the remote store,
//! plus the browser side of export (download and upload)

use bevy::prelude::*;
use std::sync::{Arc, Mutex};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{FileReader, HtmlAnchorElement, HtmlInputElement};

use modelview_core::export::GLTF_CONTENT_TYPE;
use modelview_core::loader::LoadedModel;
use modelview_core::storage::{fetch_model, list_remote_files, upload_export, Listing};
use modelview_core::{
    load_gltf, LoadOutcome, LoadTicket, ModelError, Notice, Session, StorageError,
};
use modelview_store::HttpObjectStore;

use crate::app::ViewerSession;

/// Plugin for model loading and the remote store bridge
pub struct FileLoaderPlugin;

impl Plugin for FileLoaderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingLoad>()
            .add_systems(Startup, (check_url_parameters, request_remote_listing).chain())
            .add_systems(Update, (process_pending_loads, process_store_results, show_notices).chain());
    }
}

/// A finished fetch, waiting to be handed to the session
pub struct FetchedModel {
    pub ticket: LoadTicket,
    pub source: String,
    pub result: Result<LoadedModel, ModelError>,
}

/// Outcome of a FileReader pass
pub type FileRead = Result<Vec<u8>, String>;

/// A local file chosen in the picker. `bytes` is filled once the browser
/// has read it.
pub struct PickedFile {
    pub name: String,
    pub bytes: Arc<Mutex<Option<FileRead>>>,
}

/// A picked file holding its load ticket while the read is in flight
struct ReadingFile {
    ticket: LoadTicket,
    file: PickedFile,
}

/// Results produced by browser callbacks and futures, drained every frame
#[derive(Resource, Default)]
pub struct PendingLoad {
    /// Loads started through `begin_load`
    pub fetched: Arc<Mutex<Vec<FetchedModel>>>,
    /// Files chosen since the last frame, not yet ticketed
    pub picked: Arc<Mutex<Vec<PickedFile>>>,
    reading: Vec<ReadingFile>,
    pub listing: Arc<Mutex<Option<Result<Listing, StorageError>>>>,
    pub uploads: Arc<Mutex<Vec<Result<String, StorageError>>>>,
}

fn take_slot<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.try_lock().ok().and_then(|mut s| s.take())
}

fn drain<T>(queue: &Mutex<Vec<T>>) -> Vec<T> {
    queue
        .try_lock()
        .map(|mut q| std::mem::take(&mut *q))
        .unwrap_or_default()
}

/// Store client for the configured bucket
pub fn open_store(session: &ViewerSession) -> Option<HttpObjectStore> {
    match HttpObjectStore::from_config(&session.config().store) {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::error!("Failed to create store client: {}", e);
            None
        }
    }
}

/// Apply `?model=`, `?bucket=` and `?prefix=` on startup
fn check_url_parameters(mut session: ResMut<ViewerSession>, pending: Res<PendingLoad>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Ok(location) = window.location().href() else {
        return;
    };
    let Ok(url) = web_sys::Url::new(&location) else {
        return;
    };
    let params = url.search_params();

    if let Some(bucket) = params.get("bucket") {
        tracing::info!("Using bucket from URL parameter: {}", bucket);
        session.store_mut().bucket = bucket;
    }
    if let Some(prefix) = params.get("prefix") {
        session.store_mut().prefix = prefix;
    }
    if let Some(model_url) = params.get("model") {
        tracing::info!("Loading model from URL parameter: {}", model_url);
        load_from_url(&mut session, &pending, model_url);
    }
}

/// Start fetching a model by URL. Any load still in flight becomes stale.
pub fn load_from_url(session: &mut ViewerSession, pending: &PendingLoad, url: String) {
    let Some(store) = open_store(session) else {
        return;
    };
    let ticket = session.begin_load(&url);
    let fetched = pending.fetched.clone();

    wasm_bindgen_futures::spawn_local(async move {
        let result = fetch_model(&store, &url).await;
        if let Ok(mut queue) = fetched.lock() {
            queue.push(FetchedModel {
                ticket,
                source: url,
                result,
            });
        }
    });
}

/// List the remote store on startup
fn request_remote_listing(session: Res<ViewerSession>, pending: Res<PendingLoad>) {
    if !session.config().store.is_enabled() {
        tracing::info!("No bucket configured, remote listing disabled");
        return;
    }
    let Some(store) = open_store(&session) else {
        return;
    };
    let prefix = session.config().store.prefix.clone();
    let listing = pending.listing.clone();

    wasm_bindgen_futures::spawn_local(async move {
        let result = list_remote_files(&store, &prefix).await;
        if let Ok(mut slot) = listing.lock() {
            *slot = Some(result);
        }
    });
}

/// Export the live model and upload it under `name`
pub fn upload_model(session: &mut ViewerSession, pending: &PendingLoad, name: Option<&str>) {
    if !session.config().store.is_enabled() {
        session.push_notice(Notice::Error("No bucket configured".to_string()));
        return;
    }
    let file = match session.export_remote(name) {
        Ok(Some(file)) => file,
        // Failures are already queued as notices
        Ok(None) | Err(_) => return,
    };
    let Some(store) = open_store(session) else {
        return;
    };
    let prefix = session.config().store.prefix.clone();
    let uploads = pending.uploads.clone();

    wasm_bindgen_futures::spawn_local(async move {
        let result = upload_export(&store, &prefix, &file.name, file.contents).await;
        if let Ok(mut queue) = uploads.lock() {
            queue.push(result);
        }
    });
}

/// Export the live model and offer it as a browser download
pub fn download_model(session: &mut ViewerSession, name: Option<&str>) {
    let file = match session.export_local(name) {
        Ok(Some(file)) => file,
        // Failures are already queued as notices
        Ok(None) | Err(_) => return,
    };
    if let Err(e) = trigger_download(&file.name, &file.contents) {
        tracing::error!("Download failed: {:?}", e);
        session.push_notice(Notice::Error(format!("Download failed: {e:?}")));
    }
}

fn trigger_download(name: &str, contents: &str) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("No window")?;
    let document = window.document().ok_or("No document")?;

    let parts = js_sys::Array::of1(&JsValue::from_str(contents));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(GLTF_CONTENT_TYPE);
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;

    let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    anchor.set_href(&url);
    anchor.set_download(name);
    anchor.click();
    web_sys::Url::revoke_object_url(&url)?;
    tracing::info!("Downloaded {} ({} bytes)", name, contents.len());
    Ok(())
}

/// Ask the user for a remote file name. `None` when the prompt is cancelled.
pub fn prompt_file_name(default: &str) -> Option<String> {
    let window = web_sys::window()?;
    window
        .prompt_with_message_and_default("Enter a file name", default)
        .ok()
        .flatten()
}

/// Give every newly chosen file its ticket. Runs before the UI pass, so a
/// file chosen before a remote request also gets the older ticket.
fn ticket_picked_files(session: &mut Session, pending: &mut PendingLoad) {
    for file in drain(&pending.picked) {
        let ticket = session.begin_load(&file.name);
        pending.reading.push(ReadingFile { ticket, file });
    }
}

/// Hand finished reads to the session; stale tickets are dropped there
fn complete_file_reads(session: &mut Session, pending: &mut PendingLoad) {
    let mut still_reading = Vec::new();
    for reading in std::mem::take(&mut pending.reading) {
        let Some(read) = take_slot(&reading.file.bytes) else {
            still_reading.push(reading);
            continue;
        };
        let name = &reading.file.name;
        let result = read
            .map_err(ModelError::Read)
            .and_then(|bytes| load_gltf(&bytes));
        if let LoadOutcome::Stale = session.complete_load(reading.ticket, name, result) {
            tracing::debug!("Dropped superseded load of {}", name);
        }
    }
    pending.reading = still_reading;
}

fn process_pending_loads(mut session: ResMut<ViewerSession>, mut pending: ResMut<PendingLoad>) {
    ticket_picked_files(&mut session.0, &mut pending);
    complete_file_reads(&mut session.0, &mut pending);

    for fetched in drain(&pending.fetched) {
        if let LoadOutcome::Stale =
            session.complete_load(fetched.ticket, &fetched.source, fetched.result)
        {
            tracing::debug!("Dropped superseded load of {}", fetched.source);
        }
    }
}

fn process_store_results(mut session: ResMut<ViewerSession>, pending: Res<PendingLoad>) {
    if let Some(listing) = take_slot(&pending.listing) {
        session.set_remote_listing(listing);
    }
    for upload in drain(&pending.uploads) {
        session.record_upload(upload);
    }
}

/// Surface session notices as browser alerts
fn show_notices(mut session: ResMut<ViewerSession>) {
    let notices = session.take_notices();
    if notices.is_empty() {
        return;
    }
    let Some(window) = web_sys::window() else {
        return;
    };
    for notice in notices {
        if let Notice::Error(message) = &notice {
            tracing::warn!("{}", message);
        }
        let _ = window.alert_with_message(notice.message());
    }
}

/// Open the browser file dialog; the chosen file is queued in
/// `PendingLoad::picked` as soon as it is selected, its bytes follow later
pub fn create_file_picker(pending: &PendingLoad) {
    let Some(window) = web_sys::window() else {
        tracing::error!("create_file_picker: no window");
        return;
    };
    let Some(document) = window.document() else {
        tracing::error!("create_file_picker: no document");
        return;
    };

    let input: HtmlInputElement = match document.create_element("input") {
        Ok(el) => match el.dyn_into() {
            Ok(input) => input,
            Err(_) => {
                tracing::error!("create_file_picker: failed to cast to HtmlInputElement");
                return;
            }
        },
        Err(e) => {
            tracing::error!("create_file_picker: failed to create input element: {:?}", e);
            return;
        }
    };

    input.set_type("file");
    input.set_accept(".glb,.gltf");
    let _ = input.style().set_property("display", "none");

    // click() needs the input in the DOM in several browsers
    let Some(body) = document.body() else {
        tracing::error!("create_file_picker: no document body");
        return;
    };
    if let Err(e) = body.append_child(&input) {
        tracing::error!("create_file_picker: failed to append: {:?}", e);
        return;
    }

    let picked = pending.picked.clone();
    let input_for_removal = input.clone();

    let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
        let Some(input) = event
            .target()
            .and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
        else {
            return;
        };

        if let Some(parent) = input_for_removal.parent_node() {
            let _ = parent.remove_child(&input_for_removal);
        }

        let Some(file) = input.files().and_then(|files| files.get(0)) else {
            return;
        };
        let filename = file.name();
        tracing::info!("File selected: {}", filename);

        let bytes: Arc<Mutex<Option<FileRead>>> = Arc::default();
        if let Ok(mut queue) = picked.lock() {
            queue.push(PickedFile {
                name: filename,
                bytes: bytes.clone(),
            });
        }
        let fail = |slot: &Mutex<Option<FileRead>>, message: String| {
            tracing::error!("File read error: {}", message);
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(Err(message));
            }
        };

        let reader = match FileReader::new() {
            Ok(r) => r,
            Err(e) => {
                fail(&bytes, format!("{e:?}"));
                return;
            }
        };

        let bytes_inner = bytes.clone();
        let onload = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let Some(reader) = event
                .target()
                .and_then(|t| t.dyn_into::<FileReader>().ok())
            else {
                fail(&bytes_inner, "no reader on load event".to_string());
                return;
            };
            match reader.result() {
                Ok(result) => {
                    let data = js_sys::Uint8Array::new(&result).to_vec();
                    tracing::info!("File loaded: {} bytes", data.len());
                    if let Ok(mut slot) = bytes_inner.lock() {
                        *slot = Some(Ok(data));
                    }
                }
                Err(e) => fail(&bytes_inner, format!("{e:?}")),
            }
        }) as Box<dyn FnMut(_)>);

        reader.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();

        if let Err(e) = reader.read_as_array_buffer(&file) {
            fail(&bytes, format!("{e:?}"));
        }
    }) as Box<dyn FnMut(_)>);

    input.set_onchange(Some(closure.as_ref().unchecked_ref()));
    closure.forget();

    tracing::info!("Opening file picker dialog");
    input.click();
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelview_core::SceneGraph;

    fn empty_model(name: &str) -> LoadedModel {
        LoadedModel {
            graph: SceneGraph::new(name),
            clips: Vec::new(),
        }
    }

    fn pick(pending: &PendingLoad, name: &str) -> Arc<Mutex<Option<FileRead>>> {
        let bytes: Arc<Mutex<Option<FileRead>>> = Arc::default();
        pending.picked.lock().unwrap().push(PickedFile {
            name: name.to_string(),
            bytes: bytes.clone(),
        });
        bytes
    }

    #[test]
    fn test_file_pick_takes_ticket_before_bytes_arrive() {
        let mut session = Session::default();
        let mut pending = PendingLoad::default();
        let bytes = pick(&pending, "local.glb");

        ticket_picked_files(&mut session, &mut pending);
        assert!(session.is_loading());
        complete_file_reads(&mut session, &mut pending);
        assert_eq!(pending.reading.len(), 1);

        // A remote request made while the file is still being read
        let remote = session.begin_load("https://example.com/remote.glb");
        *bytes.lock().unwrap() = Some(Ok(b"late local bytes".to_vec()));
        complete_file_reads(&mut session, &mut pending);
        assert!(pending.reading.is_empty());
        assert!(session.is_loading());
        assert!(session.take_notices().is_empty());

        let outcome = session.complete_load(remote, "remote.glb", Ok(empty_model("remote")));
        assert_eq!(outcome, LoadOutcome::Applied);
        assert_eq!(session.source(), Some("remote.glb"));
    }

    #[test]
    fn test_failed_file_read_clears_loading() {
        let mut session = Session::default();
        let mut pending = PendingLoad::default();
        let bytes = pick(&pending, "broken.glb");
        ticket_picked_files(&mut session, &mut pending);

        *bytes.lock().unwrap() = Some(Err("NotReadableError".to_string()));
        complete_file_reads(&mut session, &mut pending);
        assert!(!session.is_loading());
        assert_eq!(
            session.take_notices(),
            vec![Notice::Error(
                "Failed to load model: File read failed: NotReadableError".to_string()
            )]
        );
    }
}
