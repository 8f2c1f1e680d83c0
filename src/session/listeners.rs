use tokio::task::JoinHandle;

/// A long-lived observation task that is cancelled when its owner drops it.
pub(crate) struct ListenerTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ListenerTask {
    pub(crate) fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        log::debug!("Starting {} listener", name);
        Self {
            name,
            handle: tokio::spawn(future),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ListenerTask {
    fn drop(&mut self) {
        log::debug!("Stopping {} listener", self.name);
        self.handle.abort();
    }
}

/// Listeners bound to the active device; replaced as a unit on device change.
#[derive(Default)]
pub(crate) struct DeviceListeners {
    rotation: Option<ListenerTask>,
    subject_area: Option<ListenerTask>,
}

impl DeviceListeners {
    /// Install listeners for a newly active device. Callers `clear` first so
    /// the previous device's listeners are gone before the new ones start.
    pub(crate) fn install(&mut self, rotation: ListenerTask, subject_area: ListenerTask) {
        self.clear();
        self.rotation = Some(rotation);
        self.subject_area = Some(subject_area);
    }

    pub(crate) fn clear(&mut self) {
        self.rotation.take();
        self.subject_area.take();
    }

    pub(crate) fn is_active(&self) -> bool {
        self.rotation.as_ref().is_some_and(|t| !t.is_finished())
            && self.subject_area.as_ref().is_some_and(|t| !t.is_finished())
    }
}
