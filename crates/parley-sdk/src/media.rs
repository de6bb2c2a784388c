//! Image and location sharing.
//!
//! Device hardware and object storage sit behind the [`DeviceServices`] and
//! [`MediaStore`] traits. [`MediaActions`] turns a user's choice from the
//! attachment sheet into a [`Payload`] ready for the send pipeline.

use crate::error::{MediaError, Result, SdkError};
use crate::events::Notice;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use parley_core::{GeoPoint, Payload};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Fallback name for uploads whose URI has no usable file name.
pub const DEFAULT_UPLOAD_NAME: &str = "image.jpg";

/// A device feature that needs the user's permission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceCapability {
    MediaLibrary,
    Camera,
    Location,
}

impl std::fmt::Display for DeviceCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceCapability::MediaLibrary => write!(f, "media library"),
            DeviceCapability::Camera => write!(f, "camera"),
            DeviceCapability::Location => write!(f, "location"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// An image chosen from the library or captured with the camera.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickedImage {
    /// Local URI of the image on the device.
    pub uri: String,
    pub bytes: Vec<u8>,
}

impl PickedImage {
    pub fn new(uri: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            uri: uri.into(),
            bytes,
        }
    }
}

/// Options offered by the attachment sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceAction {
    ChooseFromLibrary,
    TakePhoto,
    ShareLocation,
    Cancel,
}

impl DeviceAction {
    pub const ALL: [DeviceAction; 4] = [
        DeviceAction::ChooseFromLibrary,
        DeviceAction::TakePhoto,
        DeviceAction::ShareLocation,
        DeviceAction::Cancel,
    ];

    /// Label shown on the sheet.
    pub fn label(self) -> &'static str {
        match self {
            DeviceAction::ChooseFromLibrary => "Choose From Library",
            DeviceAction::TakePhoto => "Take Picture",
            DeviceAction::ShareLocation => "Send Location",
            DeviceAction::Cancel => "Cancel",
        }
    }
}

/// Camera, photo library and GPS.
#[async_trait]
pub trait DeviceServices: Send + Sync + 'static {
    async fn request_permission(&self, capability: DeviceCapability) -> PermissionStatus;

    /// `None` when the user backed out of the picker.
    async fn pick_image(&self) -> std::result::Result<Option<PickedImage>, MediaError>;

    /// `None` when the user backed out of the camera.
    async fn capture_photo(&self) -> std::result::Result<Option<PickedImage>, MediaError>;

    async fn current_location(&self) -> std::result::Result<GeoPoint, MediaError>;
}

/// Hosted object storage for shared images.
#[async_trait]
pub trait MediaStore: Send + Sync + 'static {
    /// Store `bytes` at `path` and return a download URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> std::result::Result<String, MediaError>;
}

/// Storage path for an image uploaded by `user_id`.
pub fn upload_path(user_id: &str, local_uri: &str, unix_millis: i64) -> String {
    let filename = local_uri
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_UPLOAD_NAME);
    format!("images/{}_{}_{}", user_id, unix_millis, filename)
}

/// Runs attachment-sheet actions against the device and media store.
#[derive(Clone)]
pub struct MediaActions {
    device: Arc<dyn DeviceServices>,
    store: Arc<dyn MediaStore>,
}

impl MediaActions {
    pub fn new(device: Arc<dyn DeviceServices>, store: Arc<dyn MediaStore>) -> Self {
        Self { device, store }
    }

    /// Run an action. `Ok(None)` means nothing should be sent.
    pub async fn perform(&self, action: DeviceAction, user_id: &str) -> Result<Option<Payload>> {
        match action {
            DeviceAction::ChooseFromLibrary => self.share_from_library(user_id).await,
            DeviceAction::TakePhoto => self.take_photo(user_id).await,
            DeviceAction::ShareLocation => self.share_location().await.map(Some),
            DeviceAction::Cancel => Ok(None),
        }
    }

    pub async fn share_from_library(&self, user_id: &str) -> Result<Option<Payload>> {
        self.require(DeviceCapability::MediaLibrary).await?;
        match self.device.pick_image().await? {
            Some(image) => self.upload(user_id, image).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn take_photo(&self, user_id: &str) -> Result<Option<Payload>> {
        self.require(DeviceCapability::Camera).await?;
        match self.device.capture_photo().await? {
            Some(image) => self.upload(user_id, image).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn share_location(&self) -> Result<Payload> {
        self.require(DeviceCapability::Location).await?;
        let point = self.device.current_location().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read device location");
            e
        })?;
        if !point.is_valid() {
            return Err(SdkError::InvalidLocation {
                latitude: point.latitude,
                longitude: point.longitude,
            });
        }
        Ok(Payload::location(point.latitude, point.longitude))
    }

    async fn require(&self, capability: DeviceCapability) -> Result<()> {
        match self.device.request_permission(capability).await {
            PermissionStatus::Granted => Ok(()),
            PermissionStatus::Denied => {
                tracing::info!(%capability, "Permission denied");
                Err(SdkError::PermissionDenied(capability))
            }
        }
    }

    async fn upload(&self, user_id: &str, image: PickedImage) -> Result<Payload> {
        let path = upload_path(user_id, &image.uri, Utc::now().timestamp_millis());
        let size = image.bytes.len();
        let url = self.store.upload(&path, image.bytes).await.map_err(|e| {
            tracing::warn!(%path, error = %e, "Image upload failed");
            e
        })?;
        tracing::debug!(%path, size, "Image uploaded");
        Ok(Payload::image(url))
    }
}

/// The notice shown for a failed attachment action, if any.
pub fn notice_for(error: &SdkError) -> Option<Notice> {
    match error {
        SdkError::PermissionDenied(capability) => Some(Notice::permission_denied(*capability)),
        SdkError::Media(MediaError::Upload(_)) | SdkError::Media(MediaError::Device(_)) => {
            Some(Notice::upload_failed())
        }
        SdkError::Media(MediaError::Location(_)) | SdkError::InvalidLocation { .. } => {
            Some(Notice::location_failed())
        }
        _ => None,
    }
}

#[derive(Default)]
struct ScriptState {
    denied: HashSet<DeviceCapability>,
    images: VecDeque<PickedImage>,
    photos: VecDeque<PickedImage>,
    location: Option<GeoPoint>,
    location_error: Option<String>,
    permission_requests: usize,
}

/// Device with pre-programmed answers for tests and demos.
///
/// Every permission is granted until denied. Pickers return queued images
/// in order and behave like a cancelled picker once the queue is empty.
#[derive(Default)]
pub struct ScriptedDevice {
    state: RwLock<ScriptState>,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, capability: DeviceCapability) {
        self.state.write().denied.insert(capability);
    }

    pub fn grant(&self, capability: DeviceCapability) {
        self.state.write().denied.remove(&capability);
    }

    pub fn queue_library_image(&self, image: PickedImage) {
        self.state.write().images.push_back(image);
    }

    pub fn queue_photo(&self, image: PickedImage) {
        self.state.write().photos.push_back(image);
    }

    pub fn set_location(&self, point: GeoPoint) {
        let mut state = self.state.write();
        state.location = Some(point);
        state.location_error = None;
    }

    pub fn fail_location(&self, reason: impl Into<String>) {
        self.state.write().location_error = Some(reason.into());
    }

    pub fn permission_requests(&self) -> usize {
        self.state.read().permission_requests
    }
}

#[async_trait]
impl DeviceServices for ScriptedDevice {
    async fn request_permission(&self, capability: DeviceCapability) -> PermissionStatus {
        let mut state = self.state.write();
        state.permission_requests += 1;
        if state.denied.contains(&capability) {
            PermissionStatus::Denied
        } else {
            PermissionStatus::Granted
        }
    }

    async fn pick_image(&self) -> std::result::Result<Option<PickedImage>, MediaError> {
        Ok(self.state.write().images.pop_front())
    }

    async fn capture_photo(&self) -> std::result::Result<Option<PickedImage>, MediaError> {
        Ok(self.state.write().photos.pop_front())
    }

    async fn current_location(&self) -> std::result::Result<GeoPoint, MediaError> {
        let state = self.state.read();
        if let Some(reason) = &state.location_error {
            return Err(MediaError::Location(reason.clone()));
        }
        state
            .location
            .ok_or_else(|| MediaError::Location("no position fix".to_string()))
    }
}

/// In-memory object storage.
#[derive(Default)]
pub struct MemoryMediaStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    fail_uploads: std::sync::atomic::AtomicBool,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.read().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> std::result::Result<String, MediaError> {
        if self.fail_uploads.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MediaError::Upload(format!("storage rejected '{}'", path)));
        }
        self.objects.write().insert(path.to_string(), bytes);
        Ok(format!("memory://media/{}", path))
    }
}
