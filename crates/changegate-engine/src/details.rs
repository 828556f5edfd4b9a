//! Job details attached to registrations.

use changegate_core::job::{Cause, JobMetadata};
use changegate_core::urls::is_valid_url;
use changegate_core::wire::{JobDetails, TriggerType};

/// Build job details from trigger causes.
///
/// The first user, upstream or SCM cause decides the trigger type; other
/// causes only set the message and the `default` trigger type. `root_url`
/// is the scheduler root relative upstream URLs are joined to.
pub fn from_causes(causes: &[Cause], job: &JobMetadata, root_url: &str) -> JobDetails {
    let mut details = JobDetails::default();
    for cause in causes {
        details.message = Some(cause.short_description().to_string());
        match cause {
            Cause::User { user_name, .. } => {
                details.trigger_type = Some(TriggerType::User);
                details.user_name = Some(user_name.clone());
                details.last_build_url = Some(
                    job.last_build_url
                        .clone()
                        .filter(|url| is_valid_url(url))
                        .unwrap_or_default(),
                );
                break;
            }
            Cause::Upstream {
                upstream_url,
                upstream_build,
                ..
            } => {
                details.trigger_type = Some(TriggerType::Upstream);
                let url = format!("{}{}{}/", root_url, upstream_url, upstream_build);
                if is_valid_url(&url) {
                    details.upstream_build_url = Some(url);
                }
                break;
            }
            Cause::Scm { scm_type, .. } => {
                details.trigger_type = Some(TriggerType::Scm);
                details.scm_type = scm_type.clone();
                break;
            }
            Cause::Other { .. } => {
                details.trigger_type = Some(TriggerType::Default);
            }
        }
    }
    details
}

/// Job details for a pipeline stage.
///
/// An upstream task execution URL on the root stage takes precedence over
/// the run's causes.
pub fn for_stage(
    causes: &[Cause],
    job: &JobMetadata,
    root_url: &str,
    upstream_task_execution_url: Option<&str>,
    build_url: &str,
) -> JobDetails {
    let mut details = match upstream_task_execution_url.filter(|url| !url.is_empty()) {
        Some(url) => JobDetails {
            message: Some(format!("Started by {}", url)),
            trigger_type: Some(TriggerType::Upstream),
            upstream_build_url: Some(url.to_string()),
            ..Default::default()
        },
        None => from_causes(causes, job, root_url),
    };
    if is_valid_url(build_url) {
        details.build_url = Some(build_url.to_string());
    }
    details
}
