use crate::browser::{BrowserError, SessionHandle};
use crate::traversal::{Cursor, PageTraversal, Progress, StepBatch, TraversalOutcome};

impl PageTraversal {
    pub(super) async fn next_scroll(
        &mut self,
        session: &mut SessionHandle,
    ) -> Result<Option<StepBatch>, BrowserError> {
        let Progress::Scroll {
            next_step,
            stability,
            seen,
        } = self.progress
        else {
            return Ok(None);
        };

        let url = self.source.listing_url();

        if next_step == 0 {
            let rendered = session.render(&url).await?;
            let count = session.count_elements(&self.source.extract.item).await?;
            self.pages_visited += 1;

            let (items, extraction_failed) = self.extract(&rendered, 0);
            tracing::debug!(
                "Source '{}' initial load: {} items visible",
                self.source.id,
                count
            );

            self.progress = Progress::Scroll {
                next_step: 1,
                stability: 0,
                seen: count,
            };
            if self.signal.is_end(&rendered) {
                self.outcome = Some(TraversalOutcome::EndMarker);
            }

            return Ok(Some(StepBatch {
                step: 0,
                items,
                cursor_after: Cursor::Scroll { next: 1 },
                extraction_failed,
            }));
        }

        if next_step > self.source.max_pages {
            tracing::warn!(
                "Source '{}' hit the safety bound of {} scrolls; the list may continue",
                self.source.id,
                self.source.max_pages
            );
            self.outcome = Some(TraversalOutcome::SafetyLimit);
            return Ok(None);
        }

        session.scroll_to_bottom().await?;
        if !self.limits.settle_interval.is_zero() {
            tokio::time::sleep(self.limits.settle_interval).await;
        }
        let count = session.count_elements(&self.source.extract.item).await?;
        self.pages_visited += 1;

        let mut items = Vec::new();
        let mut extraction_failed = false;
        let (stability, seen) = if count > seen {
            let rendered = session.capture(&url).await?;
            let (extracted, failed) = self.extract(&rendered, next_step);
            extraction_failed = failed;
            items = extracted
                .into_iter()
                .filter(|item| item.position as usize >= seen)
                .collect();

            if self.signal.is_end(&rendered) {
                self.outcome = Some(TraversalOutcome::EndMarker);
            }
            (0, count)
        } else {
            (stability + 1, seen)
        };

        tracing::debug!(
            "Source '{}' scroll {}: {} visible, {} new (stable for {})",
            self.source.id,
            next_step,
            count,
            items.len(),
            stability
        );

        self.progress = Progress::Scroll {
            next_step: next_step + 1,
            stability,
            seen,
        };

        if self.outcome.is_none() && stability >= self.limits.stability_threshold {
            tracing::info!(
                "Source '{}' stabilized at {} items after {} scrolls",
                self.source.id,
                seen,
                next_step
            );
            self.outcome = Some(TraversalOutcome::ScrollStabilized);
        }

        Ok(Some(StepBatch {
            step: next_step,
            items,
            cursor_after: Cursor::Scroll {
                next: next_step + 1,
            },
            extraction_failed,
        }))
    }
}
