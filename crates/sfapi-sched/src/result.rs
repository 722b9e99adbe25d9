//! Ordered batch results.

use serde::Serialize;
use sfapi_hal::{HalError, HalResult, JobHandle};

/// Outcome of a batch run, index-aligned with the input specs.
///
/// Each slot holds either the handle of a job that reached a terminal
/// status or the error that stopped that job. Slots are independent.
#[derive(Debug, Default)]
pub struct ResultSet {
    slots: Vec<HalResult<JobHandle>>,
}

impl ResultSet {
    pub(crate) fn from_slots(slots: Vec<HalResult<JobHandle>>) -> Self {
        Self { slots }
    }

    /// Number of slots (equals the number of input specs).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot for input `index`.
    pub fn get(&self, index: usize) -> Option<&HalResult<JobHandle>> {
        self.slots.get(index)
    }

    /// Iterate over slots in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, HalResult<JobHandle>> {
        self.slots.iter()
    }

    /// Handles of jobs that reached a terminal status, with their index.
    pub fn handles(&self) -> impl Iterator<Item = (usize, &JobHandle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().ok().map(|h| (i, h)))
    }

    /// Errors, with their index.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &HalError)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().err().map(|e| (i, e)))
    }

    /// Jobs that finished with `Completed`.
    pub fn completed_count(&self) -> usize {
        self.handles().filter(|(_, h)| h.status.is_success()).count()
    }

    /// True when every slot holds a `Completed` handle.
    pub fn all_completed(&self) -> bool {
        self.completed_count() == self.len()
    }

    /// A serializable per-slot summary.
    pub fn summary(&self) -> Vec<SlotSummary<'_>> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Ok(handle) => SlotSummary {
                    index,
                    job: Some(handle),
                    error: None,
                },
                Err(e) => SlotSummary {
                    index,
                    job: None,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }

    /// Take ownership of the slots.
    pub fn into_vec(self) -> Vec<HalResult<JobHandle>> {
        self.slots
    }
}

impl From<Vec<HalResult<JobHandle>>> for ResultSet {
    fn from(slots: Vec<HalResult<JobHandle>>) -> Self {
        Self::from_slots(slots)
    }
}

impl IntoIterator for ResultSet {
    type Item = HalResult<JobHandle>;
    type IntoIter = std::vec::IntoIter<HalResult<JobHandle>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a HalResult<JobHandle>;
    type IntoIter = std::slice::Iter<'a, HalResult<JobHandle>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

/// JSON view of one slot.
#[derive(Debug, Serialize)]
pub struct SlotSummary<'a> {
    /// Input index.
    pub index: usize,
    /// Handle, for jobs that reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<&'a JobHandle>,
    /// Error message, for jobs that did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfapi_hal::{JobStatus, StatusReport};

    fn sample() -> ResultSet {
        ResultSet::from_slots(vec![
            Ok(JobHandle::new("10", JobStatus::Completed)),
            Err(HalError::SubmissionFailed("quota exceeded".into())),
            Ok(JobHandle::new("12", JobStatus::Failed("TIMEOUT".into()))),
        ])
    }

    #[test]
    fn test_accessors() {
        let results = sample();
        assert_eq!(results.len(), 3);
        assert_eq!(results.handles().count(), 2);
        assert_eq!(results.errors().map(|(i, _)| i).collect::<Vec<_>>(), vec![1]);
        assert_eq!(results.completed_count(), 1);
        assert!(!results.all_completed());
        assert!(ResultSet::default().all_completed());
    }

    #[test]
    fn test_summary_json() {
        let results = sample();
        let json = serde_json::to_value(results.summary()).unwrap();
        assert_eq!(json[0]["job"]["id"], "10");
        assert!(json[1]["error"].as_str().unwrap().contains("quota exceeded"));
        assert!(json[1].get("job").is_none());
        assert_eq!(json[2]["index"], 2);
    }

    #[test]
    fn test_summary_includes_scheduler_record() {
        let mut handle = JobHandle::new("10", JobStatus::Queued);
        handle.observe_report(StatusReport::from(JobStatus::Completed).with_record(
            serde_json::json!({"jobid": "10", "state": "COMPLETED", "nodelist": "nid001234"}),
        ));
        let results = ResultSet::from_slots(vec![Ok(handle)]);

        let json = serde_json::to_value(results.summary()).unwrap();
        assert_eq!(json[0]["job"]["record"]["nodelist"], "nid001234");
        assert_eq!(json[0]["job"]["record"]["state"], "COMPLETED");
    }
}
