//! Platform resolver contract.
//!
//! The system resolver is the fallback of last resort. Implementations wrap
//! whatever the platform offers ([`GaiResolver`](super::GaiResolver),
//! [`HickoryResolver`](super::HickoryResolver)); this module only fixes the
//! contract: consistent error kinds and a caller-supplied deadline.

use super::{AnswerSet, Family, Name, ResolveError, ResolveStage};
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

/// Future returned by [`SystemResolve::lookup`].
pub type SystemLookup = Pin<Box<dyn Future<Output = Result<AnswerSet, ResolveError>> + Send>>;

/// A platform name resolver.
///
/// Implementations report `NotFound` when the name has no records of the
/// requested family and `Network` for transport failures. Records come back
/// in resolver order, filtered to `family` when one is given.
pub trait SystemResolve: Send + Sync {
    fn lookup(&self, name: Name, family: Option<Family>) -> SystemLookup;
}

impl<R: SystemResolve + ?Sized> SystemResolve for Arc<R> {
    fn lookup(&self, name: Name, family: Option<Family>) -> SystemLookup {
        (**self).lookup(name, family)
    }
}

/// Runs a system lookup bounded by `timeout`.
///
/// An elapsed deadline is reported as `Timeout` in `stage`; other errors are
/// re-tagged with `stage` so the caller can tell bootstrap lookups from the
/// final fallback.
pub async fn lookup_with_timeout(
    resolver: &dyn SystemResolve,
    name: &Name,
    family: Option<Family>,
    timeout: Duration,
    stage: ResolveStage,
) -> Result<AnswerSet, ResolveError> {
    match tokio::time::timeout(timeout, resolver.lookup(name.clone(), family)).await {
        Ok(Ok(answers)) if answers.is_empty() => Err(ResolveError::not_found(stage, name)),
        Ok(Ok(answers)) => Ok(answers),
        Ok(Err(e)) => Err(retag(e, stage, name)),
        Err(_) => {
            tracing::debug!(domain = %name, ?timeout, "system lookup timed out");
            Err(ResolveError::timeout(stage, name))
        }
    }
}

fn retag(err: ResolveError, stage: ResolveStage, name: &Name) -> ResolveError {
    if err.stage() == stage {
        return err;
    }
    let retagged = ResolveError::new(err.kind().clone(), stage, name);
    match err.detail() {
        Some(detail) => retagged.with_detail(detail.to_string()),
        None => retagged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{AddressRecord, ResolveErrorKind};
    use std::net::{IpAddr, Ipv4Addr};

    struct Slow;

    impl SystemResolve for Slow {
        fn lookup(&self, _name: Name, _family: Option<Family>) -> SystemLookup {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(AnswerSet::empty())
            })
        }
    }

    struct Fixed(AnswerSet);

    impl SystemResolve for Fixed {
        fn lookup(&self, _name: Name, _family: Option<Family>) -> SystemLookup {
            let answers = self.0.clone();
            Box::pin(async move { Ok(answers) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let name = Name::new("slow.test");
        let err = lookup_with_timeout(
            &Slow,
            &name,
            None,
            Duration::from_secs(2),
            ResolveStage::Bootstrap,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), &ResolveErrorKind::Timeout);
        assert_eq!(err.stage(), ResolveStage::Bootstrap);
    }

    #[tokio::test]
    async fn test_empty_answer_is_not_found() {
        let name = Name::new("empty.test");
        let err = lookup_with_timeout(
            &Fixed(AnswerSet::empty()),
            &name,
            None,
            Duration::from_secs(2),
            ResolveStage::System,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), &ResolveErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_answers_pass_through() {
        let name = Name::new("ok.test");
        let set = AnswerSet::single(AddressRecord::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))));
        let answers = lookup_with_timeout(
            &Fixed(set.clone()),
            &name,
            None,
            Duration::from_secs(2),
            ResolveStage::System,
        )
        .await
        .unwrap();
        assert_eq!(answers, set);
    }
}
