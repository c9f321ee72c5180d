use crate::browser::{BrowserError, SessionHandle};
use crate::traversal::{Cursor, PageTraversal, Progress, StepBatch, TraversalOutcome};

impl PageTraversal {
    pub(super) async fn next_page(
        &mut self,
        session: &mut SessionHandle,
    ) -> Result<Option<StepBatch>, BrowserError> {
        let Progress::Paged {
            next_page,
            empty_streak,
        } = self.progress
        else {
            return Ok(None);
        };

        if next_page > self.source.max_pages {
            tracing::warn!(
                "Source '{}' hit the safety bound of {} pages; the list may continue",
                self.source.id,
                self.source.max_pages
            );
            self.outcome = Some(TraversalOutcome::SafetyLimit);
            return Ok(None);
        }

        let url = self.source.page_url(next_page);
        let rendered = session.render(&url).await?;
        self.pages_visited += 1;

        if self.signal.is_end(&rendered) {
            tracing::info!(
                "Source '{}' reached its end marker on page {}",
                self.source.id,
                next_page
            );
            self.outcome = Some(TraversalOutcome::EndMarker);
            return Ok(None);
        }

        let (items, extraction_failed) = self.extract(&rendered, next_page);
        let empty_streak = if items.is_empty() {
            empty_streak + 1
        } else {
            0
        };

        tracing::debug!(
            "Source '{}' page {}: {} items (empty streak {})",
            self.source.id,
            next_page,
            items.len(),
            empty_streak
        );

        self.progress = Progress::Paged {
            next_page: next_page + 1,
            empty_streak,
        };

        if empty_streak >= self.limits.max_consecutive_empty_pages {
            tracing::info!(
                "Source '{}' stopped after {} consecutive empty pages",
                self.source.id,
                empty_streak
            );
            self.outcome = Some(TraversalOutcome::EmptyPageThreshold);
        }

        Ok(Some(StepBatch {
            step: next_page,
            items,
            cursor_after: Cursor::Page {
                next: next_page + 1,
                empty_streak,
            },
            extraction_failed,
        }))
    }
}
