//! Mover Job/Pod log tailing (spec §5.D): at most 100 lines from the
//! newest terminal pod, optionally filtered, surfaced on
//! `status.latestMoverStatus.logs`.

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, LogParams};
use kube::{Client, ResourceExt};

use crate::crd::MoverResult;
use crate::error::{Error, Result};

const MAX_LOG_LINES: i64 = 100;

/// If the named Job has reached a terminal state, return the mover's
/// result; otherwise `None` (still running).
pub async fn job_result(client: &Client, namespace: &str, job_name: &str) -> Result<Option<MoverResult>> {
    let api: Api<Job> = Api::namespaced(client.clone(), namespace);
    let job = match api.get(job_name).await {
        Ok(job) => job,
        Err(kube::Error::Api(e)) if e.code == 404 => return Ok(None),
        Err(e) => return Err(Error::from(e)),
    };
    let Some(conditions) = job.status.and_then(|s| s.conditions) else {
        return Ok(None);
    };
    let is_true = |kind: &str| {
        conditions
            .iter()
            .any(|c| c.type_ == kind && c.status == "True")
    };
    if is_true("Complete") {
        return Ok(Some(MoverResult::Successful));
    }
    if is_true("Failed") {
        return Ok(Some(MoverResult::Failed));
    }
    Ok(None)
}

/// Tail the logs of the newest pod (by creation timestamp) belonging to
/// `job_name` that has reached `Succeeded` or `Failed`, at most
/// `MAX_LOG_LINES` lines, optionally keeping only lines matching `filter`.
pub async fn tail_pod_logs(
    client: &Client,
    namespace: &str,
    job_name: &str,
    filter: Option<fn(&str) -> bool>,
) -> Result<Option<String>> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let list = pods
        .list(&ListParams::default().labels(&format!("job-name={}", job_name)))
        .await
        .map_err(Error::from)?;

    let newest = list
        .items
        .into_iter()
        .filter(|pod| {
            matches!(
                pod.status.as_ref().and_then(|s| s.phase.as_deref()),
                Some("Succeeded") | Some("Failed")
            )
        })
        .max_by_key(|pod| {
            pod.metadata
                .creation_timestamp
                .as_ref()
                .map(|t| t.0.timestamp())
                .unwrap_or(0)
        });

    let Some(pod) = newest else {
        return Ok(None);
    };

    let raw = pods
        .logs(
            &pod.name_any(),
            &LogParams {
                tail_lines: Some(MAX_LOG_LINES),
                ..Default::default()
            },
        )
        .await
        .map_err(Error::from)?;

    let lines: Vec<&str> = raw
        .lines()
        .filter(|l| filter.map(|f| f(l)).unwrap_or(true))
        .collect();
    Ok(Some(lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keeps_only_matching_lines() {
        let raw = "INFO starting\nERROR disk full\nINFO done";
        let filtered: Vec<&str> = raw
            .lines()
            .filter(|l| l.starts_with("ERROR"))
            .collect();
        assert_eq!(filtered, vec!["ERROR disk full"]);
    }
}
