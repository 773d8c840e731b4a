//! In-memory repositories and file helpers shared by orchestrator tests.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datahub_common::error::{DatahubError, DatahubResult};
use datahub_db::branches::models::Branch;
use datahub_db::branches::repositories::BranchRepository;
use datahub_db::clients::models::Client;
use datahub_db::import::models::LatestRevisions;
use datahub_db::import::repositories::ImportRepository;
use datahub_db::merge::{should_overwrite, Mergeable};
use datahub_db::products::models::{needs_history, ProductApplied, ProductSnapshot, ProductStock};
use datahub_db::products::repositories::ProductRepository;
use datahub_db::reviews::models::Review;
use datahub_db::reviews::repositories::ReviewRepository;
use datahub_db::staff::models::Staff;
use datahub_db::staff::repositories::StaffRepository;
use datahub_db::transactions::models::{TransactionBatch, TransactionItem};
use datahub_db::watermarks::models::{normalize_branch, SyncStream, WatermarkAdvance};
use datahub_db::watermarks::repositories::WatermarkRepository;

pub fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

/// Clones share one store, so a test can keep a handle while the syncer owns
/// another.
#[derive(Clone, Default)]
pub struct FakeWatermarks {
    rows: Arc<Mutex<HashMap<(SyncStream, String), Option<DateTime<Utc>>>>>,
}

impl FakeWatermarks {
    pub fn seeded(entries: &[(SyncStream, &str, DateTime<Utc>)]) -> Self {
        let fake = Self::default();
        {
            let mut rows = fake.rows.lock().unwrap();
            for (stream, branch, at) in entries {
                rows.insert((*stream, normalize_branch(branch).to_owned()), Some(*at));
            }
        }
        fake
    }

    pub fn value(&self, stream: SyncStream, branch: &str) -> Option<DateTime<Utc>> {
        self.rows
            .lock()
            .unwrap()
            .get(&(stream, normalize_branch(branch).to_owned()))
            .copied()
            .flatten()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn apply(&self, advance: &WatermarkAdvance) {
        let mut rows = self.rows.lock().unwrap();
        let slot = rows
            .entry((advance.stream, advance.branch.clone()))
            .or_insert(None);
        *slot = Some(slot.map_or(advance.candidate, |v| v.max(advance.candidate)));
    }
}

#[async_trait]
impl WatermarkRepository for FakeWatermarks {
    async fn get(&self, stream: SyncStream, branch: &str) -> DatahubResult<Option<DateTime<Utc>>> {
        Ok(self.value(stream, branch))
    }

    async fn advance(
        &self,
        stream: SyncStream,
        branch: &str,
        candidate: Option<DateTime<Utc>>,
    ) -> DatahubResult<()> {
        if let Some(at) = candidate {
            self.apply(&WatermarkAdvance::new(stream, branch, at));
        }
        Ok(())
    }

    async fn count_for(&self, streams: &[SyncStream]) -> DatahubResult<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.keys().filter(|(s, _)| streams.contains(s)).count() as i64)
    }
}

fn merge_newest<T: Mergeable + Clone>(store: &mut HashMap<T::Key, T>, rows: &[T]) -> u64 {
    let mut written = 0;
    for row in rows {
        let key = row.natural_key();
        let overwrite = store
            .get(&key)
            .map_or(true, |stored| {
                should_overwrite(stored.updated_at_upstream(), row.updated_at_upstream())
            });
        if overwrite {
            store.insert(key, row.clone());
            written += 1;
        }
    }
    written
}

/// Import store that applies watermark moves to a shared [`FakeWatermarks`]
/// only when the commit succeeds.
pub struct FakeImport {
    pub watermarks: FakeWatermarks,
    pub clients: Mutex<HashMap<String, Client>>,
    pub items: Mutex<HashMap<String, TransactionItem>>,
    pub commits: Mutex<Vec<String>>,
    /// Branches whose commit fails.
    pub fail_branches: HashSet<String>,
}

impl FakeImport {
    pub fn new(watermarks: FakeWatermarks) -> Self {
        Self {
            watermarks,
            clients: Mutex::default(),
            items: Mutex::default(),
            commits: Mutex::default(),
            fail_branches: HashSet::new(),
        }
    }

    pub fn failing_for(mut self, branch: &str) -> Self {
        self.fail_branches.insert(branch.to_string());
        self
    }
}

#[async_trait]
impl ImportRepository for FakeImport {
    async fn commit_clients(
        &self,
        clients: &[Client],
        advance: Option<&WatermarkAdvance>,
    ) -> DatahubResult<u64> {
        let written = merge_newest(&mut self.clients.lock().unwrap(), clients);
        if let Some(advance) = advance {
            self.watermarks.apply(advance);
        }
        self.commits.lock().unwrap().push("clients".into());
        Ok(written)
    }

    async fn commit_transactions(
        &self,
        batch: &TransactionBatch,
        advance: Option<&WatermarkAdvance>,
    ) -> DatahubResult<u64> {
        let branch = batch
            .items
            .first()
            .map(|i| i.branch_id.clone())
            .or_else(|| advance.map(|a| a.branch.clone()))
            .unwrap_or_default();
        if self.fail_branches.contains(&branch) {
            return Err(DatahubError::Database(format!("commit rejected for {branch}")));
        }

        let written = merge_newest(&mut self.items.lock().unwrap(), &batch.items);
        if let Some(advance) = advance {
            self.watermarks.apply(advance);
        }
        self.commits.lock().unwrap().push(format!("transactions:{branch}"));
        Ok(written + batch.transactions.len() as u64)
    }

    async fn latest_revisions(&self) -> DatahubResult<LatestRevisions> {
        let mut by_branch: HashMap<String, DateTime<Utc>> = HashMap::new();
        for item in self.items.lock().unwrap().values() {
            if let (false, Some(at)) = (item.branch_id.is_empty(), item.updated_at_upstream) {
                let entry = by_branch.entry(item.branch_id.clone()).or_insert(at);
                *entry = (*entry).max(at);
            }
        }
        let mut transactions_by_branch: Vec<_> = by_branch.into_iter().collect();
        transactions_by_branch.sort();

        let clients = self
            .clients
            .lock()
            .unwrap()
            .values()
            .filter_map(|c| c.updated_at_upstream)
            .max();

        Ok(LatestRevisions {
            transactions_by_branch,
            clients,
        })
    }
}

#[derive(Default)]
pub struct FakeReviews {
    pub rows: Mutex<HashMap<String, Review>>,
    pub inserted_batches: Mutex<usize>,
}

impl FakeReviews {
    pub fn with_ids<I: IntoIterator<Item = String>>(ids: I) -> Self {
        let fake = Self::default();
        {
            let mut rows = fake.rows.lock().unwrap();
            for id in ids {
                rows.insert(
                    id.clone(),
                    Review {
                        review_id: id,
                        ..Default::default()
                    },
                );
            }
        }
        fake
    }
}

#[async_trait]
impl ReviewRepository for FakeReviews {
    async fn existing_ids(&self, review_ids: &[String]) -> DatahubResult<HashSet<String>> {
        let rows = self.rows.lock().unwrap();
        Ok(review_ids
            .iter()
            .filter(|id| rows.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn insert_missing(&self, reviews: &[Review]) -> DatahubResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut inserted = 0;
        for review in reviews {
            if !rows.contains_key(&review.review_id) {
                rows.insert(review.review_id.clone(), review.clone());
                inserted += 1;
            }
        }
        *self.inserted_batches.lock().unwrap() += 1;
        Ok(inserted)
    }

    async fn has_any(&self) -> DatahubResult<bool> {
        Ok(!self.rows.lock().unwrap().is_empty())
    }
}

#[derive(Default)]
pub struct FakeStaff {
    pub rows: Mutex<HashMap<(String, String), Staff>>,
}

#[async_trait]
impl StaffRepository for FakeStaff {
    async fn upsert_staff(&self, staff: &[Staff]) -> DatahubResult<u64> {
        Ok(merge_newest(&mut self.rows.lock().unwrap(), staff))
    }
}

#[derive(Default)]
pub struct FakeBranches {
    pub rows: Mutex<HashMap<String, Branch>>,
}

#[async_trait]
impl BranchRepository for FakeBranches {
    async fn upsert_branches(&self, branches: &[Branch]) -> DatahubResult<u64> {
        Ok(merge_newest(&mut self.rows.lock().unwrap(), branches))
    }
}

#[derive(Default)]
pub struct FakeProducts {
    pub stock: Mutex<HashMap<(String, String), ProductStock>>,
    pub history: Mutex<Vec<(String, Option<f64>)>>,
}

#[async_trait]
impl ProductRepository for FakeProducts {
    async fn apply_snapshot(
        &self,
        snapshot: &ProductSnapshot,
        _snapshot_time: DateTime<Utc>,
    ) -> DatahubResult<ProductApplied> {
        let key = (
            snapshot.stock.product_id.clone(),
            snapshot.stock.branch_id.clone(),
        );
        let mut stock = self.stock.lock().unwrap();
        let previous = stock.get(&key).cloned();

        let stock_written = previous.as_ref().map_or(true, |p| {
            should_overwrite(p.updated_at_upstream, snapshot.stock.updated_at_upstream)
        });
        let history_written =
            stock_written && needs_history(previous.as_ref(), &snapshot.stock);

        if stock_written {
            stock.insert(key, snapshot.stock.clone());
        }
        if history_written {
            self.history.lock().unwrap().push((
                snapshot.stock.product_id.clone(),
                snapshot.stock.quantity_in_stock,
            ));
        }

        Ok(ProductApplied {
            product_written: stock_written,
            stock_written,
            history_written,
        })
    }
}
