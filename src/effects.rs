use std::future::Future;

use log::{info, warn};

use crate::error::Error;

/// Outcome of one best-effort step that ran after the primary state change.
#[derive(Debug)]
pub struct EffectOutcome {
    pub step: &'static str,
    pub error: Option<Error>,
}

impl EffectOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Ordered list of post-commit side effects. Each step runs after the primary
/// database write has been committed; a failing step is recorded and logged
/// but never aborts later steps, rolls back the write, or fails the request.
#[derive(Debug, Default)]
pub struct SideEffects {
    outcomes: Vec<EffectOutcome>,
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F>(&mut self, step: &'static str, fut: F)
    where
        F: Future<Output = Result<(), Error>>,
    {
        match fut.await {
            Ok(()) => {
                info!("side effect {} completed", step);
                self.outcomes.push(EffectOutcome { step, error: None });
            }
            Err(e) => {
                warn!("side effect {} failed: {}", step, e);
                self.outcomes.push(EffectOutcome { step, error: Some(e) });
            }
        }
    }

    pub fn outcomes(&self) -> &[EffectOutcome] {
        &self.outcomes
    }

    pub fn failed_steps(&self) -> Vec<&'static str> {
        self.outcomes.iter().filter(|o| !o.succeeded()).map(|o| o.step).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_failure_does_not_stop_later_steps() {
        let mut effects = SideEffects::new();
        effects.run("notification", async { Ok(()) }).await;
        effects.run("email", async { Err(Error::Internal("smtp down".into())) }).await;
        effects.run("audit_log", async { Ok(()) }).await;

        assert_eq!(effects.outcomes().len(), 3);
        assert_eq!(effects.failed_steps(), vec!["email"]);
        assert!(effects.outcomes()[2].succeeded());
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let mut effects = SideEffects::new();
        effects.run("notification", async { Ok(()) }).await;
        effects.run("audit_log", async { Ok(()) }).await;
        assert!(effects.failed_steps().is_empty());
    }
}
