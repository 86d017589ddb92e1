//! Renderer contract.
//!
//! The engine decides *when* to render; producing bytes at `config.dest` is
//! the renderer's job. Implementations report whether the destination
//! changed, which drives the "notify only on change unless forced" rule.
//! Write errors are the renderer's to report (by logging); it must still
//! return a well-defined answer.

use topogen_core::config::Config;
use topogen_core::context::Context;

/// Renders one config against a context snapshot.
pub trait TemplateRenderer: Send + Sync + 'static {
    /// Renders `ctx` to `config.dest` and returns whether the destination
    /// bytes differ from what was there before.
    fn generate_file(&self, config: &Config, ctx: &Context) -> bool;
}

/// 테스트용 렌더러 -- 호출을 기록하고 설정된 변경 여부를 반환합니다.
#[cfg(test)]
pub(crate) struct RecordingRenderer {
    changed: std::sync::atomic::AtomicBool,
    renders: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingRenderer {
    pub(crate) fn new(changed: bool) -> Self {
        Self {
            changed: std::sync::atomic::AtomicBool::new(changed),
            renders: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_changed(&self, changed: bool) {
        self.changed
            .store(changed, std::sync::atomic::Ordering::SeqCst);
    }

    /// Destinations rendered so far, in call order.
    pub(crate) fn renders(&self) -> Vec<String> {
        self.renders.lock().expect("render lock").clone()
    }

    pub(crate) fn render_count(&self) -> usize {
        self.renders.lock().expect("render lock").len()
    }
}

#[cfg(test)]
impl TemplateRenderer for RecordingRenderer {
    fn generate_file(&self, config: &Config, _ctx: &Context) -> bool {
        self.renders
            .lock()
            .expect("render lock")
            .push(config.dest.clone());
        self.changed.load(std::sync::atomic::Ordering::SeqCst)
    }
}
