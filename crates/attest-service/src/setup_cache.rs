//! # Setup Key Cache
//!
//! Keys produced by [`ProofSystem::setup`] are reused for every later
//! request naming the same `(system, circuit)`. Each key is set up at most
//! once on success: concurrent callers for the same key wait on that key's
//! slot, while other keys proceed independently. Failures are not cached.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use attest_core::{CircuitId, ProofSystemId};
use attest_zkp::{CircuitDescriptor, ProofError, ProofSystem, SetupResult};

type Slot = Arc<Mutex<Option<Arc<SetupResult>>>>;

#[derive(Debug, Default)]
pub struct SetupCache {
    slots: Mutex<HashMap<(ProofSystemId, CircuitId), Slot>>,
}

impl SetupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached setup for `circuit` on `backend`, running setup on a miss.
    pub fn get_or_setup(
        &self,
        backend: &dyn ProofSystem,
        circuit: &CircuitDescriptor,
    ) -> Result<Arc<SetupResult>, ProofError> {
        let slot = Arc::clone(
            self.slots
                .lock()
                .entry((backend.id(), circuit.id))
                .or_default(),
        );
        let mut guard = slot.lock();
        if let Some(cached) = guard.as_ref() {
            return Ok(Arc::clone(cached));
        }
        tracing::info!(system = %backend.id(), circuit_id = %circuit.id, "running circuit setup");
        let result = Arc::new(backend.setup(circuit)?);
        *guard = Some(Arc::clone(&result));
        Ok(result)
    }

    /// Number of keys with a completed setup. Waits for setups in flight
    /// without holding up lookups of other keys.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use attest_zkp::{
        Capabilities, ProofArtifact, ProofRequest, VerificationRequest, VerifyError,
        VerifyOutcome,
    };

    #[derive(Debug, Default)]
    struct Counting {
        setups: AtomicU32,
        fail: bool,
        /// Setup of the circuit named "slow" reports in, then waits here.
        entered: Mutex<Option<mpsc::Sender<()>>>,
        gate: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl ProofSystem for Counting {
        fn id(&self) -> ProofSystemId {
            ProofSystemId::from_static("counting")
        }
        fn setup(&self, circuit: &CircuitDescriptor) -> Result<SetupResult, ProofError> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            if circuit.name == "slow" {
                if let Some(entered) = self.entered.lock().take() {
                    let _ = entered.send(());
                }
                let gate = self.gate.lock().take();
                if let Some(gate) = gate {
                    let _ = gate.recv();
                }
            }
            if self.fail {
                return Err(ProofError::SetupFailed("ceremony offline".into()));
            }
            Ok(SetupResult {
                proving_key: circuit.name.as_bytes().to_vec(),
                verification_key: vec![1],
                metadata: BTreeMap::new(),
            })
        }
        fn generate(&self, _: &ProofRequest) -> Result<ProofArtifact, ProofError> {
            Err(ProofError::GenerationFailed("unused".into()))
        }
        fn verify(&self, _: &VerificationRequest) -> Result<VerifyOutcome, VerifyError> {
            Ok(VerifyOutcome::valid())
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                supports_setup: true,
                requires_trusted_setup: true,
                supports_custom_circuits: true,
                async_only: false,
                typical_generation_ms: 1,
                max_proof_size_bytes: 1,
                features: vec![],
            }
        }
    }

    fn circuit(name: &str) -> CircuitDescriptor {
        CircuitDescriptor {
            id: CircuitId::new(),
            name: name.into(),
            definition: serde_json::json!({}),
        }
    }

    #[test]
    fn setup_runs_once_per_circuit() {
        let backend = Counting::default();
        let cache = SetupCache::new();
        let age = circuit("age");
        let range = circuit("range");

        let first = cache.get_or_setup(&backend, &age).unwrap();
        let second = cache.get_or_setup(&backend, &age).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.proving_key, b"age");

        cache.get_or_setup(&backend, &range).unwrap();
        assert_eq!(backend.setups.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let backend = Counting {
            fail: true,
            ..Counting::default()
        };
        let cache = SetupCache::new();
        let c = circuit("age");
        assert!(cache.get_or_setup(&backend, &c).is_err());
        assert!(cache.get_or_setup(&backend, &c).is_err());
        assert_eq!(backend.setups.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_callers_share_one_setup() {
        let backend = Arc::new(Counting::default());
        let cache = Arc::new(SetupCache::new());
        let c = circuit("age");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (backend, cache, c) = (Arc::clone(&backend), Arc::clone(&cache), c.clone());
                std::thread::spawn(move || cache.get_or_setup(&*backend, &c).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(backend.setups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn len_does_not_stall_other_keys_behind_a_running_setup() {
        let (entered_tx, entered) = mpsc::channel();
        let (release, gate) = mpsc::channel();
        let backend = Arc::new(Counting {
            entered: Mutex::new(Some(entered_tx)),
            gate: Mutex::new(Some(gate)),
            ..Counting::default()
        });
        let cache = Arc::new(SetupCache::new());

        let slow = std::thread::spawn({
            let (backend, cache) = (Arc::clone(&backend), Arc::clone(&cache));
            move || cache.get_or_setup(&*backend, &circuit("slow")).map(|_| ())
        });
        entered.recv_timeout(Duration::from_secs(5)).unwrap();

        // Counting waits for the slow setup to settle.
        let counter = std::thread::spawn({
            let cache = Arc::clone(&cache);
            move || cache.len()
        });
        std::thread::sleep(Duration::from_millis(50));

        let (done_tx, done) = mpsc::channel();
        std::thread::spawn({
            let (backend, cache) = (Arc::clone(&backend), Arc::clone(&cache));
            move || {
                let _ = done_tx.send(cache.get_or_setup(&*backend, &circuit("fast")).is_ok());
            }
        });
        let other_key = done.recv_timeout(Duration::from_secs(5));

        release.send(()).unwrap();
        slow.join().unwrap().unwrap();
        let counted = counter.join().unwrap();

        assert_eq!(other_key, Ok(true));
        assert!((1..=2).contains(&counted));
        assert_eq!(cache.len(), 2);
    }
}
