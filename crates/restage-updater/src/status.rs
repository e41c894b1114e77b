use restage_core::UpdatePhase;

/// The narrow interface to whatever surface the operator is watching: a
/// terminal, or a chat message the embedding bot edits in place. The engine
/// pushes one `phase` call per named step, in order.
pub trait StatusReporter {
    fn phase(&mut self, phase: UpdatePhase, detail: &str);
    fn note(&mut self, message: &str);
}

pub struct NullReporter;

impl StatusReporter for NullReporter {
    fn phase(&mut self, _phase: UpdatePhase, _detail: &str) {}
    fn note(&mut self, _message: &str) {}
}
