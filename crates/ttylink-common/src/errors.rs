/// The only fault that crosses a connection boundary as a value.
///
/// Registration conflicts are signaled by the registry's `register`
/// return and relays to stale sessions degrade to a logged drop, so
/// neither needs an error variant.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("device off-line: {0}")]
    DeviceOffline(String),
}
