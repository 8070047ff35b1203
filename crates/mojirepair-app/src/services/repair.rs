//! Paged scan → sanitize → write-back loop.

use std::{fmt, sync::Arc};

use bon::Builder;
use tracing::{debug, info, warn};

use crate::constants::DEFAULT_PAGE_SIZE;
use crate::services::sanitizer::{Resolution, Sanitizer};
use crate::store::{Record, RecordId, RecordPatch, RecordStore, StoreError};

#[derive(Debug, Clone, Builder)]
pub struct RepairOptions {
    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
    #[builder(default)]
    pub start_offset: usize,
    /// Report fixes without writing them.
    #[builder(default)]
    pub dry_run: bool,
    /// Sanitize descriptions as well as titles.
    #[builder(default)]
    pub include_descriptions: bool,
    pub max_pages: Option<usize>,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Title => f.write_str("Title"),
            Field::Description => f.write_str("Description"),
        }
    }
}

/// Progress notifications emitted while a run advances.
#[derive(Debug, Clone)]
pub enum RepairEvent {
    BatchStarted {
        offset: usize,
    },
    FixProposed {
        id: RecordId,
        field: Field,
        before: String,
        after: String,
        resolution: Resolution,
    },
    Saved {
        id: RecordId,
    },
    WriteFailed {
        id: RecordId,
        error: StoreError,
    },
    WriteSkipped {
        id: RecordId,
    },
    Completed {
        summary: RunSummary,
    },
}

/// Why pagination ended.
#[derive(Debug, Clone)]
pub enum StopReason {
    /// The store returned an empty page.
    Exhausted,
    /// The store returned fewer rows than requested.
    FinalPage,
    /// The configured page budget was spent.
    PageLimit,
    /// A page could not be fetched; later pages were never scanned.
    FetchFailed { offset: usize, error: StoreError },
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub scanned: usize,
    pub fixed: usize,
    pub failed_writes: usize,
    pub oracle_calls: usize,
    pub pages: usize,
    pub dry_run: bool,
    pub stop: StopReason,
}

impl RunSummary {
    pub fn is_truncated(&self) -> bool {
        matches!(self.stop, StopReason::FetchFailed { .. })
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Completed. Scanned: {}, Fixed: {}",
            self.scanned, self.fixed
        )?;
        if self.dry_run {
            f.write_str(" (dry run)")?;
        }
        if let StopReason::FetchFailed { offset, error } = &self.stop {
            write!(f, " (stopped early at offset {offset}: {error})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    scanned: usize,
    fixed: usize,
    failed_writes: usize,
    oracle_calls: usize,
    pages: usize,
}

pub struct Repairer {
    store: Arc<dyn RecordStore>,
    sanitizer: Sanitizer,
    options: RepairOptions,
}

impl Repairer {
    pub fn new(store: Arc<dyn RecordStore>, sanitizer: Sanitizer, options: RepairOptions) -> Self {
        Self {
            store,
            sanitizer,
            options,
        }
    }

    /// Walks every page once. Per-record failures are reported through events and
    /// counted; they never end the run.
    pub async fn run<F>(&self, mut on_event: F) -> RunSummary
    where
        F: FnMut(&RepairEvent),
    {
        let page_size = self.options.page_size.max(1);
        let mut offset = self.options.start_offset;
        let mut counters = Counters::default();

        let stop = loop {
            if let Some(max) = self.options.max_pages
                && counters.pages >= max
            {
                break StopReason::PageLimit;
            }

            on_event(&RepairEvent::BatchStarted { offset });
            let page = match self.store.fetch_page(offset, page_size).await {
                Ok(page) => page,
                Err(error) => {
                    warn!(offset, error = %error, "page fetch failed; stopping run");
                    break StopReason::FetchFailed { offset, error };
                }
            };
            counters.pages += 1;
            debug!(offset, rows = page.len(), "fetched page");

            if page.is_empty() {
                break StopReason::Exhausted;
            }

            let rows = page.len();
            for record in page {
                self.process_record(record, &mut counters, &mut on_event)
                    .await;
            }

            if rows < page_size {
                break StopReason::FinalPage;
            }
            offset += page_size;
        };

        let summary = RunSummary {
            scanned: counters.scanned,
            fixed: counters.fixed,
            failed_writes: counters.failed_writes,
            oracle_calls: counters.oracle_calls,
            pages: counters.pages,
            dry_run: self.options.dry_run,
            stop,
        };
        info!(
            scanned = summary.scanned,
            fixed = summary.fixed,
            failed = summary.failed_writes,
            oracle_calls = summary.oracle_calls,
            pages = summary.pages,
            "repair run finished"
        );
        on_event(&RepairEvent::Completed {
            summary: summary.clone(),
        });
        summary
    }

    async fn process_record<F>(&self, record: Record, counters: &mut Counters, on_event: &mut F)
    where
        F: FnMut(&RepairEvent),
    {
        counters.scanned += 1;
        let mut patch = RecordPatch::default();
        let mut proposed = false;

        if let Some(title) = record.title.as_deref() {
            patch.title = self
                .propose(&record.id, Field::Title, title, counters, on_event, &mut proposed)
                .await;
        }
        if self.options.include_descriptions
            && let Some(description) = record.description.as_deref()
        {
            patch.description = self
                .propose(
                    &record.id,
                    Field::Description,
                    description,
                    counters,
                    on_event,
                    &mut proposed,
                )
                .await;
        }

        if !proposed {
            return;
        }

        // Every proposed value was empty; nothing can be written, dry run or not.
        if patch.is_empty() {
            counters.failed_writes += 1;
            let error = StoreError::EmptyPatch {
                id: record.id.clone(),
            };
            warn!(id = %record.id, "proposed fix clears the value; not writing");
            on_event(&RepairEvent::WriteFailed {
                id: record.id,
                error,
            });
            return;
        }

        if self.options.dry_run {
            counters.fixed += 1;
            on_event(&RepairEvent::WriteSkipped { id: record.id });
            return;
        }

        match self.store.update(&record.id, &patch).await {
            Ok(()) => {
                counters.fixed += 1;
                on_event(&RepairEvent::Saved { id: record.id });
            }
            Err(error) => {
                counters.failed_writes += 1;
                warn!(id = %record.id, error = %error, "record update failed");
                on_event(&RepairEvent::WriteFailed {
                    id: record.id,
                    error,
                });
            }
        }
    }

    /// Sanitizes one field and returns the value to write, if any.
    ///
    /// A change to an empty value is still proposed but never written.
    async fn propose<F>(
        &self,
        id: &RecordId,
        field: Field,
        original: &str,
        counters: &mut Counters,
        on_event: &mut F,
        proposed: &mut bool,
    ) -> Option<String>
    where
        F: FnMut(&RepairEvent),
    {
        if original.is_empty() {
            return None;
        }

        let sanitized = self.sanitizer.sanitize(original).await;
        if sanitized.resolution.consulted_oracle() {
            counters.oracle_calls += 1;
        }
        if !sanitized.differs_from(original) {
            return None;
        }

        *proposed = true;
        on_event(&RepairEvent::FixProposed {
            id: id.clone(),
            field,
            before: original.to_owned(),
            after: sanitized.text.clone(),
            resolution: sanitized.resolution,
        });
        (!sanitized.text.is_empty()).then_some(sanitized.text)
    }
}
