//! Translating a [`WorkSpec`] into a `batch/v1` Job.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kreplay_core::WorkSpec;

pub const CONTAINER_NAME: &str = "task";

/// One pod, run once, removed as soon as it finishes.
pub fn build_job(name: &str, spec: &WorkSpec) -> Job {
    let resources = spec.cpu_millis.map(|millis| ResourceRequirements {
        requests: Some(BTreeMap::from([(
            "cpu".to_string(),
            Quantity(format!("{millis}m")),
        )])),
        ..Default::default()
    });

    Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            completions: Some(1),
            ttl_seconds_after_finished: Some(0),
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(spec.image.clone()),
                        command: Some(spec.command.clone()),
                        resources,
                        ..Default::default()
                    }],
                    restart_policy: Some("OnFailure".to_string()),
                    scheduler_name: spec.scheduler_name.clone(),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
