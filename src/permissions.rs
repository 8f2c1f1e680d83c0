use crate::platform::CaptureBackend;

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Permission restricted (parental controls, etc)
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

/// Check camera permission status with detailed information
pub fn check_permission_detailed(backend: &dyn CaptureBackend) -> PermissionInfo {
    let status = backend.authorization_status();
    let (message, can_request) = match status {
        PermissionStatus::Granted => ("Camera access authorized", false),
        PermissionStatus::Denied => ("Camera access denied by the user", false),
        PermissionStatus::Restricted => ("Camera access restricted by system policy", false),
        PermissionStatus::NotDetermined => ("Camera permission not yet requested", true),
    };
    PermissionInfo {
        status,
        message: message.to_string(),
        can_request,
    }
}

/// Whether the app may use the camera.
///
/// Prompts for access when the status hasn't been determined yet.
pub async fn ensure_authorized(backend: &dyn CaptureBackend) -> bool {
    let info = check_permission_detailed(backend);
    log::debug!("Camera permission: {} ({})", info.status, info.message);

    let status = if info.can_request {
        let requested = backend.request_access();
        log::info!("Requested camera access: {}", requested);
        requested
    } else {
        info.status
    };

    status == PermissionStatus::Granted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimulatedBackend;

    #[test]
    fn test_permission_display() {
        assert_eq!(PermissionStatus::NotDetermined.to_string(), "not_determined");
        assert_eq!(PermissionStatus::Granted.to_string(), "granted");
    }

    #[tokio::test]
    async fn test_not_determined_prompts() {
        let backend = SimulatedBackend::new();
        backend.set_authorization(PermissionStatus::NotDetermined, PermissionStatus::Granted);
        assert!(ensure_authorized(&backend).await);
        assert_eq!(backend.calls().access_requests, 1);
    }

    #[tokio::test]
    async fn test_denied_does_not_prompt() {
        let backend = SimulatedBackend::new();
        backend.set_authorization(PermissionStatus::Denied, PermissionStatus::Granted);
        assert!(!ensure_authorized(&backend).await);
        assert_eq!(backend.calls().access_requests, 0);
    }

    #[tokio::test]
    async fn test_prompt_refused() {
        let backend = SimulatedBackend::new();
        backend.set_authorization(PermissionStatus::NotDetermined, PermissionStatus::Denied);
        assert!(!ensure_authorized(&backend).await);
    }
}
