//! Greedy byte-budgeted batch packing
//!
//! Fragments are appended in plan order to the open batch while
//! `batch + fragment + footer` stays within `max_bytes`. A required fragment
//! that does not fit closes the batch and opens the next one; a separator that
//! does not fit is dropped. A fragment too large even for a fresh batch still
//! gets one, flagged `oversized`.

use super::plan::{Fragment, FragmentPlan};
use super::templates::ChannelTemplate;
use crate::report::ReportData;
use serde::Serialize;
use tracing::{debug, info};

/// One complete, sendable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageBatch {
    pub body: String,
    /// Fragments carried, excluding header and footer
    pub fragments: usize,
    /// Exceeds the budget because of one indivisible fragment
    pub oversized: bool,
}

impl MessageBatch {
    pub fn byte_len(&self) -> usize {
        self.body.len()
    }
}

/// Batch under construction with its running byte count
struct OpenBatch {
    body: String,
    fragments: usize,
    oversized: bool,
}

impl OpenBatch {
    fn len(&self) -> usize {
        self.body.len()
    }

    fn has_content(&self) -> bool {
        self.fragments > 0
    }

    fn push(&mut self, fragment: &Fragment) {
        self.body.push_str(&fragment.text);
        self.fragments += 1;
    }
}

/// Packs fragment plans for one channel
#[derive(Debug, Clone)]
pub struct BatchSplitter {
    max_bytes: usize,
    header: String,
    footer: String,
    placeholder: String,
}

impl BatchSplitter {
    pub fn new(
        max_bytes: usize,
        header: impl Into<String>,
        footer: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        Self {
            max_bytes,
            header: header.into(),
            footer: footer.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Splitter using a template's header, footer and placeholder
    pub fn for_channel(template: &dyn ChannelTemplate, report: &ReportData, max_bytes: usize) -> Self {
        Self::new(
            max_bytes,
            template.header(report),
            template.footer(),
            template.empty_placeholder(report.mode),
        )
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }

    fn open(&self) -> OpenBatch {
        OpenBatch {
            body: self.header.clone(),
            fragments: 0,
            oversized: false,
        }
    }

    fn fits(&self, batch: &OpenBatch, fragment: &Fragment) -> bool {
        batch.len() + fragment.len() + self.footer.len() <= self.max_bytes
    }

    fn close(&self, mut batch: OpenBatch) -> MessageBatch {
        batch.body.push_str(&self.footer);
        if batch.oversized {
            info!(
                bytes = batch.body.len(),
                max_bytes = self.max_bytes,
                "Indivisible fragment exceeds budget, sent as its own batch"
            );
        }
        MessageBatch {
            body: batch.body,
            fragments: batch.fragments,
            oversized: batch.oversized,
        }
    }

    /// Pack `plan` into batches, each including header and footer
    ///
    /// An empty plan yields exactly one batch carrying the placeholder.
    pub fn split(&self, plan: &FragmentPlan) -> Vec<MessageBatch> {
        let mut batches = Vec::new();
        let mut current = self.open();

        for fragment in plan.iter() {
            let fits = self.fits(&current, fragment);

            if fragment.kind.is_optional() {
                if fits && current.has_content() {
                    current.push(fragment);
                } else {
                    debug!(bytes = fragment.len(), "Separator dropped at batch boundary");
                }
                continue;
            }

            if fits {
                current.push(fragment);
                continue;
            }

            if current.has_content() {
                batches.push(self.close(current));
                current = self.open();
            }
            if !self.fits(&current, fragment) {
                current.oversized = true;
            }
            current.push(fragment);
        }

        if current.has_content() {
            batches.push(self.close(current));
        } else if batches.is_empty() {
            let placeholder = Fragment::item(self.placeholder.as_str());
            current.oversized = !self.fits(&current, &placeholder);
            current.push(&placeholder);
            batches.push(self.close(current));
        }

        debug!(
            fragments = plan.len(),
            batches = batches.len(),
            max_bytes = self.max_bytes,
            "Plan split"
        );
        batches
    }

    /// Strip header and footer from a batch body
    pub fn content<'b>(&self, batch: &'b MessageBatch) -> &'b str {
        let body = batch.body.as_str();
        let body = body.strip_prefix(self.header.as_str()).unwrap_or(body);
        body.strip_suffix(self.footer.as_str()).unwrap_or(body)
    }
}
