//! Distributed coordination glue: the `Comm` trait abstracts over the
//! real external MPI-like transport; `LocalComm` is an in-process
//! multi-shard simulation used by tests and single-machine operation.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Barrier;

/// Everything a graph algorithm needs from the cluster transport:
/// rank/size identity, collectives, and a fire-and-forget async message
/// channel drained only after a barrier.
#[async_trait]
pub trait Comm: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    async fn barrier(&self);
    async fn all_reduce_sum_u64(&self, local: u64) -> u64;
    /// Exclusive prefix sum across ranks: rank `r` receives the sum of
    /// `local` from ranks `0..r`.
    async fn prefix_sum_u64(&self, local: u64) -> u64;
    async fn broadcast_u64_vec(&self, from_rank0: Vec<u64>) -> Vec<u64>;
    async fn broadcast_json(&self, from_rank0: serde_json::Value) -> serde_json::Value;

    /// Enqueue `msg` for `to_rank`; delivered no earlier than the next
    /// `barrier()` this rank and the target both pass.
    fn async_send(&self, to_rank: usize, msg: serde_json::Value);
    /// Drain every message enqueued for this rank since the last drain.
    /// Call only after a `barrier()` so that messages from two different
    /// "before this barrier" windows never interleave with the wrong
    /// drain.
    fn drain(&self) -> Vec<serde_json::Value>;

    async fn gather_to_rank0_json(&self, local: Vec<serde_json::Value>) -> Vec<serde_json::Value>;
}

/// Helpers built on top of `Comm::async_send`/`drain` for strongly typed
/// payloads, kept outside the trait itself so `Comm` stays object-safe.
pub async fn send_typed<T: Serialize>(comm: &dyn Comm, to_rank: usize, msg: &T) {
    comm.async_send(to_rank, serde_json::to_value(msg).expect("serializable message"));
}

pub fn drain_typed<T: DeserializeOwned>(comm: &dyn Comm) -> Vec<T> {
    comm.drain()
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

struct Shared {
    mailboxes: Vec<Mutex<VecDeque<serde_json::Value>>>,
    barrier: Barrier,
}

/// A single-process simulation of `size` cooperating shards. Each
/// `LocalComm` handle shares one `Shared` (mailboxes + a `tokio::sync::
/// Barrier`) with its siblings; collectives are implemented directly
/// against that shared state rather than simulating wire messages.
pub struct LocalComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalComm {
    /// Build `size` handles that all agree on the same shared mailboxes
    /// and barrier — the shape every test and single-machine run uses.
    pub fn new_group(size: usize) -> Vec<LocalComm> {
        let shared = Arc::new(Shared {
            mailboxes: (0..size).map(|_| Mutex::new(VecDeque::new())).collect(),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                shared: shared.clone(),
            })
            .collect()
    }

    /// A single-shard group, the common case for unit tests that don't
    /// exercise cross-shard behavior.
    pub fn solo() -> LocalComm {
        Self::new_group(1).pop().unwrap()
    }
}

#[async_trait]
impl Comm for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.mailboxes.len()
    }

    async fn barrier(&self) {
        self.shared.barrier.wait().await;
    }

    async fn all_reduce_sum_u64(&self, local: u64) -> u64 {
        // Every non-rank0 shard forwards its value to rank 0's mailbox;
        // rank 0 folds its own `local` in directly rather than routing
        // it through the mailbox too, so it is counted exactly once.
        if self.rank != 0 {
            self.async_send(0, serde_json::json!({ "__reduce": local }));
        }
        self.barrier().await;
        if self.rank == 0 {
            let mut total = local;
            let msgs = self.drain();
            for msg in &msgs {
                if let Some(v) = msg.get("__reduce").and_then(|v| v.as_u64()) {
                    total += v;
                }
            }
            let result = serde_json::json!({ "__reduce_result": total });
            self.broadcast_json(result).await.get("__reduce_result").and_then(|v| v.as_u64()).unwrap_or(total)
        } else {
            let result = self.broadcast_json(serde_json::Value::Null).await;
            result.get("__reduce_result").and_then(|v| v.as_u64()).unwrap_or(local)
        }
    }

    async fn prefix_sum_u64(&self, local: u64) -> u64 {
        self.async_send(0, serde_json::json!({ "__rank": self.rank, "__local": local }));
        self.barrier().await;

        if self.rank == 0 {
            let mut per_rank = vec![0u64; self.size()];
            per_rank[0] = local;
            for msg in self.drain() {
                if let (Some(r), Some(l)) = (
                    msg.get("__rank").and_then(|v| v.as_u64()),
                    msg.get("__local").and_then(|v| v.as_u64()),
                ) {
                    per_rank[r as usize] = l;
                }
            }
            let mut prefixes = vec![0u64; self.size()];
            let mut running = 0u64;
            for (i, v) in per_rank.into_iter().enumerate() {
                prefixes[i] = running;
                running += v;
            }
            let prefixes_json = serde_json::to_value(&prefixes).unwrap();
            let broadcast = self.broadcast_json(prefixes_json).await;
            let all: Vec<u64> = serde_json::from_value(broadcast).unwrap_or_default();
            all[0]
        } else {
            let broadcast = self.broadcast_json(serde_json::Value::Null).await;
            let all: Vec<u64> = serde_json::from_value(broadcast).unwrap_or_default();
            all.get(self.rank).copied().unwrap_or(0)
        }
    }

    async fn broadcast_u64_vec(&self, from_rank0: Vec<u64>) -> Vec<u64> {
        let json = self
            .broadcast_json(serde_json::to_value(from_rank0).unwrap())
            .await;
        serde_json::from_value(json).unwrap_or_default()
    }

    async fn broadcast_json(&self, from_rank0: serde_json::Value) -> serde_json::Value {
        if self.rank == 0 {
            for r in 1..self.size() {
                self.async_send(r, from_rank0.clone());
            }
            self.barrier().await;
            from_rank0
        } else {
            self.barrier().await;
            self.drain().into_iter().next().unwrap_or(serde_json::Value::Null)
        }
    }

    fn async_send(&self, to_rank: usize, msg: serde_json::Value) {
        self.shared.mailboxes[to_rank].lock().push_back(msg);
    }

    fn drain(&self) -> Vec<serde_json::Value> {
        let mut mailbox = self.shared.mailboxes[self.rank].lock();
        mailbox.drain(..).collect()
    }

    async fn gather_to_rank0_json(&self, local: Vec<serde_json::Value>) -> Vec<serde_json::Value> {
        self.async_send(0, serde_json::json!({ "__gather": local }));
        self.barrier().await;
        if self.rank == 0 {
            let mut all = Vec::new();
            for msg in self.drain() {
                if let Some(items) = msg.get("__gather").and_then(|v| v.as_array()) {
                    all.extend(items.iter().cloned());
                }
            }
            all
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn solo_comm_barrier_and_broadcast_roundtrip() {
        let comm = LocalComm::solo();
        comm.barrier().await;
        let got = comm.broadcast_json(serde_json::json!(42)).await;
        assert_eq!(got, serde_json::json!(42));
    }

    #[tokio::test]
    async fn all_reduce_sums_across_ranks() {
        let group = LocalComm::new_group(3);
        let mut handles = Vec::new();
        for (i, comm) in group.into_iter().enumerate() {
            handles.push(tokio::spawn(async move { comm.all_reduce_sum_u64(i as u64 + 1).await }));
        }
        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        // 1 + 2 + 3 = 6, seen identically by every rank.
        assert_eq!(results, vec![6, 6, 6]);
    }

    #[tokio::test]
    async fn prefix_sum_is_exclusive_and_ordered_by_rank() {
        let group = LocalComm::new_group(3);
        let locals = [2u64, 5, 1];
        let mut handles = Vec::new();
        for (i, comm) in group.into_iter().enumerate() {
            let local = locals[i];
            handles.push(tokio::spawn(async move { comm.prefix_sum_u64(local).await }));
        }
        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        assert_eq!(results, vec![0, 2, 7]);
    }

    #[tokio::test]
    async fn async_send_is_only_visible_after_a_barrier() {
        let group = LocalComm::new_group(2);
        let mut iter = group.into_iter();
        let a = iter.next().unwrap();
        let b = iter.next().unwrap();

        a.async_send(1, serde_json::json!({"hello": "world"}));
        assert!(b.drain().is_empty());

        let (_, _) = tokio::join!(a.barrier(), b.barrier());
        let msgs = b.drain();
        assert_eq!(msgs, vec![serde_json::json!({"hello": "world"})]);
    }
}
