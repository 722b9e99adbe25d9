//! SLURM job state mapping.
//!
//! `sacct` reports long state names (`COMPLETED`, `CANCELLED by 12345`),
//! `squeue` reports short codes (`CD`, `CA`). Both map onto [`JobStatus`].

use sfapi_hal::JobStatus;

/// Map a SLURM state string to a [`JobStatus`].
pub fn parse_slurm_state(raw: &str) -> JobStatus {
    let state = raw.trim().to_ascii_uppercase();
    // "CANCELLED by 95745", "RUNNING+" etc.
    let head = state
        .split(|c: char| c.is_whitespace() || c == '+')
        .next()
        .unwrap_or_default();

    match head {
        "PENDING" | "PD" | "CONFIGURING" | "CF" | "REQUEUED" | "RQ" | "REQUEUE_HOLD"
        | "REQUEUE_FED" | "RESV_DEL_HOLD" | "SUSPENDED" | "S" | "STOPPED" | "ST" | "RESIZING"
        | "RS" => JobStatus::Queued,
        "RUNNING" | "R" | "COMPLETING" | "CG" | "STAGE_OUT" | "SO" | "SIGNALING" | "SI" => {
            JobStatus::Running
        }
        "COMPLETED" | "CD" => JobStatus::Completed,
        "CANCELLED" | "CA" => JobStatus::Cancelled,
        "FAILED" | "F" | "TIMEOUT" | "TO" | "NODE_FAIL" | "NF" | "OUT_OF_MEMORY" | "OOM"
        | "BOOT_FAIL" | "BF" | "DEADLINE" | "DL" | "PREEMPTED" | "PR" | "REVOKED" | "RV"
        | "SPECIAL_EXIT" | "SE" => JobStatus::Failed(head.to_string()),
        _ => JobStatus::Unknown(raw.trim().to_string()),
    }
}
