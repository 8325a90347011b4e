//! # Bundle Source
//!
//! Owns the live [`ConfigBundle`] of a channel and a frozen, ordered list of
//! subscribers notified whenever the bundle is replaced.
//!
//! ## Guarantees
//!
//! - `current()` is a single atomic pointer load. Readers observe either the
//!   bundle the channel was created with or a later fully-built bundle.
//! - Subscribers run synchronously in declared order, once at construction
//!   and once per `update`.
//! - A failing subscriber is logged; the remaining subscribers still run.
//! - `update` is not serialised internally. Callers (the commit path of a
//!   single channel) are sequential already.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use super::bundle::ConfigBundle;
use super::errors::ChannelResult;

/// A handler notified with every new bundle.
pub trait BundleSubscriber: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn on_update(&self, bundle: &Arc<ConfigBundle>) -> ChannelResult<()>;
}

/// Atomic holder of the current bundle plus its subscribers.
pub struct BundleSource {
    current: ArcSwap<ConfigBundle>,
    subscribers: Box<[Box<dyn BundleSubscriber>]>,
}

impl BundleSource {
    /// Store `initial`, freeze the subscriber list and prime every
    /// subscriber with the initial bundle before returning.
    pub fn new(initial: Arc<ConfigBundle>, subscribers: Vec<Box<dyn BundleSubscriber>>) -> Self {
        let source = Self {
            current: ArcSwap::new(Arc::clone(&initial)),
            subscribers: subscribers.into_boxed_slice(),
        };
        source.notify(&initial);
        source
    }

    /// Publish `bundle`, then notify every subscriber in order.
    pub fn update(&self, bundle: Arc<ConfigBundle>) {
        self.current.store(Arc::clone(&bundle));
        self.notify(&bundle);
    }

    /// The most recently published bundle.
    pub fn current(&self) -> Arc<ConfigBundle> {
        self.current.load_full()
    }

    /// Names of the subscribers, in notification order.
    pub fn subscriber_names(&self) -> Vec<&'static str> {
        self.subscribers.iter().map(|s| s.name()).collect()
    }

    fn notify(&self, bundle: &Arc<ConfigBundle>) {
        for subscriber in self.subscribers.iter() {
            match subscriber.on_update(bundle) {
                Ok(()) => debug!(
                    "[{}] subscriber {} applied config sequence {}",
                    bundle.channel_id(),
                    subscriber.name(),
                    bundle.sequence()
                ),
                Err(e) => warn!(
                    channel = %bundle.channel_id(),
                    subscriber = subscriber.name(),
                    "Config subscriber failed: {}",
                    e
                ),
            }
        }
    }
}

impl std::fmt::Debug for BundleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleSource")
            .field("channel_id", &self.current.load().channel_id())
            .field("sequence", &self.current.load().sequence())
            .field("subscribers", &self.subscriber_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ChannelError;
    use parking_lot::Mutex;
    use shared_types::ChannelConfig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<(&'static str, u64)>>>,
        fail: bool,
    }

    impl BundleSubscriber for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn on_update(&self, bundle: &Arc<ConfigBundle>) -> ChannelResult<()> {
            self.log.lock().push((self.name, bundle.sequence()));
            if self.fail {
                return Err(ChannelError::Config("boom".into()));
            }
            Ok(())
        }
    }

    fn bundle(sequence: u64) -> Arc<ConfigBundle> {
        let config = ChannelConfig {
            sequence,
            ..Default::default()
        };
        Arc::new(ConfigBundle::new("ch1", config).unwrap())
    }

    fn recorders(log: &Arc<Mutex<Vec<(&'static str, u64)>>>, failing: &str) -> Vec<Box<dyn BundleSubscriber>> {
        ["gossip", "trust-roots", "msp", "resources"]
            .into_iter()
            .map(|name| {
                Box::new(Recorder {
                    name,
                    log: Arc::clone(log),
                    fail: name == failing,
                }) as Box<dyn BundleSubscriber>
            })
            .collect()
    }

    #[test]
    fn test_construct_primes_subscribers_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = BundleSource::new(bundle(0), recorders(&log, ""));
        assert_eq!(
            *log.lock(),
            vec![("gossip", 0), ("trust-roots", 0), ("msp", 0), ("resources", 0)]
        );
        assert_eq!(source.current().sequence(), 0);
    }

    #[test]
    fn test_update_notifies_each_subscriber_once_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = BundleSource::new(bundle(0), recorders(&log, ""));
        log.lock().clear();

        source.update(bundle(1));

        assert_eq!(
            *log.lock(),
            vec![("gossip", 1), ("trust-roots", 1), ("msp", 1), ("resources", 1)]
        );
        assert_eq!(source.current().sequence(), 1);
    }

    #[test]
    fn test_failing_subscriber_does_not_stop_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = BundleSource::new(bundle(0), recorders(&log, "trust-roots"));
        log.lock().clear();

        source.update(bundle(1));

        let names: Vec<_> = log.lock().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["gossip", "trust-roots", "msp", "resources"]);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_bundle() {
        let source = Arc::new(BundleSource::new(bundle(0), Vec::new()));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let source = Arc::clone(&source);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut last = 0;
                    while !done.load(Ordering::Acquire) {
                        let current = source.current();
                        assert_eq!(current.channel_id(), "ch1");
                        assert!(current.sequence() >= last, "sequence went backwards");
                        last = current.sequence();
                    }
                })
            })
            .collect();

        for sequence in 1..=200 {
            source.update(bundle(sequence));
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(source.current().sequence(), 200);
    }
}
