//! Line classifier for deploy script output
//!
//! Maps one line of subprocess output onto at most one [`ProgressEvent`].
//! Classification is an ordered table of rules evaluated top to bottom; the
//! first rule whose trigger matches and whose builder yields an event wins.
//! A builder may decline (service name not extractable), in which case
//! evaluation falls through to later rules. Unrecognized lines yield no
//! event and are never an error.

use crate::progress::types::{ProgressEvent, ProgressStatus, Stage};
use regex::Regex;
use std::sync::OnceLock;

/// Substring tests applied to the cleaned line before a builder runs
enum Trigger {
    /// Line contains the marker
    Contains(&'static str),
    /// Line contains every marker
    All(&'static [&'static str]),
    /// Line contains at least one marker
    Any(&'static [&'static str]),
}

impl Trigger {
    fn matches(&self, line: &str) -> bool {
        match self {
            Trigger::Contains(marker) => line.contains(marker),
            Trigger::All(markers) => markers.iter().all(|m| line.contains(m)),
            Trigger::Any(markers) => markers.iter().any(|m| line.contains(m)),
        }
    }
}

struct Rule {
    trigger: Trigger,
    build: fn(&str) -> Option<ProgressEvent>,
}

/// Classification rules in priority order. Markers are the exact strings
/// the deploy script prints; see the contract notes on each builder.
const RULES: &[Rule] = &[
    Rule {
        trigger: Trigger::Contains("Performing connection checks and prerequisites"),
        build: |_| {
            Some(ProgressEvent::stage_level(
                Stage::Prerequisites,
                ProgressStatus::Running,
                "Connection Checks & Prerequisites",
            ))
        },
    },
    Rule {
        trigger: Trigger::Contains("All prerequisites checks passed!"),
        build: |line| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Prerequisites,
                    ProgressStatus::Success,
                    "Connection Checks & Prerequisites",
                )
                .with_details(parenthesized_suffix(line)),
            )
        },
    },
    Rule {
        trigger: Trigger::Contains("Prerequisites check failed"),
        build: |_| {
            Some(ProgressEvent::stage_level(
                Stage::Prerequisites,
                ProgressStatus::Error,
                "Connection Checks & Prerequisites",
            ))
        },
    },
    Rule {
        trigger: Trigger::Contains("Maven Settings XML Updated"),
        build: |line| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Settings,
                    ProgressStatus::Success,
                    "Maven Settings XML Update",
                )
                .with_details(parenthesized_suffix(line)),
            )
        },
    },
    Rule {
        trigger: Trigger::Contains("Building microservice:"),
        build: |line| {
            let service = service_after(line, "Building microservice:");
            Some(ProgressEvent::for_service(
                Stage::Build,
                service.clone(),
                ProgressStatus::Running,
                format!("Building {}", service),
            ))
        },
    },
    Rule {
        trigger: Trigger::Contains("Build completed successfully for"),
        build: |line| {
            let service = service_after(line, "Build completed successfully for");
            Some(ProgressEvent::for_service(
                Stage::Build,
                service.clone(),
                ProgressStatus::Success,
                format!("Build completed for {}", service),
            ))
        },
    },
    Rule {
        trigger: Trigger::Any(&[
            "BUILD FAILURE",
            "Build failed for",
            "Failed to execute goal",
            "Compilation failure",
        ]),
        // Scoped to a service only when the per-service marker is present;
        // otherwise a stage-level build error.
        build: |line| {
            if line.contains("Build failed for") {
                let service = service_after(line, "Build failed for");
                if !service.is_empty() {
                    return Some(
                        ProgressEvent::for_service(
                            Stage::Build,
                            service.clone(),
                            ProgressStatus::Error,
                            format!("Build failed for {}", service),
                        )
                        .with_details(line.to_string()),
                    );
                }
            }
            Some(ProgressEvent::stage_level(
                Stage::Build,
                ProgressStatus::Error,
                "Building Microservices",
            ))
        },
    },
    Rule {
        // Maven reactor header, e.g. "--- Building att-simulator 1.4.2 ---"
        trigger: Trigger::All(&["Building", "---"]),
        build: |line| {
            let idx = line.find("Building ")?;
            let remaining = &line[idx + "Building ".len()..];
            let end = remaining.find(' ')?;
            let service = &remaining[..end];
            Some(ProgressEvent::for_service(
                Stage::Build,
                service,
                ProgressStatus::Running,
                format!("Maven building {}", service),
            ))
        },
    },
    Rule {
        trigger: Trigger::All(&["DOCKER>", "Step"]),
        build: |line| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Deploy,
                    ProgressStatus::Running,
                    "Building Docker image",
                )
                .with_details(docker_step(line)),
            )
        },
    },
    Rule {
        trigger: Trigger::All(&["DOCKER>", "Successfully built"]),
        build: |line| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Deploy,
                    ProgressStatus::Running,
                    "Docker image built successfully",
                )
                .with_details(docker_image_id(line)),
            )
        },
    },
    Rule {
        trigger: Trigger::All(&["DOCKER>", "Successfully tagged"]),
        build: |line| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Deploy,
                    ProgressStatus::Running,
                    "Docker image tagged",
                )
                .with_details(token_after(line, "Successfully tagged ")),
            )
        },
    },
    Rule {
        trigger: Trigger::Contains("The push refers to repository"),
        build: |line| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Deploy,
                    ProgressStatus::Running,
                    "Pushing to registry",
                )
                .with_details(bracketed(line)),
            )
        },
    },
    Rule {
        trigger: Trigger::All(&["Pushed", ":"]),
        build: |_| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Deploy,
                    ProgressStatus::Running,
                    "Uploading layers",
                )
                .with_details("Layer pushed successfully"),
            )
        },
    },
    Rule {
        trigger: Trigger::All(&["Pushing", "[", "]"]),
        build: |line| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Deploy,
                    ProgressStatus::Running,
                    "Uploading to Nexus",
                )
                .with_details(push_progress(line)),
            )
        },
    },
    Rule {
        trigger: Trigger::Contains("Deploying microservice:"),
        build: |line| {
            let service = service_after(line, "Deploying microservice:");
            Some(ProgressEvent::for_service(
                Stage::Deploy,
                service.clone(),
                ProgressStatus::Running,
                format!("Deploying {}", service),
            ))
        },
    },
    Rule {
        trigger: Trigger::Contains("Docker image build completed successfully for"),
        build: |line| {
            let service = service_after(line, "Docker image build completed successfully for");
            Some(ProgressEvent::for_service(
                Stage::Deploy,
                service.clone(),
                ProgressStatus::Success,
                format!("Docker image built for {}", service),
            ))
        },
    },
    Rule {
        trigger: Trigger::All(&["Microservice", "patched with new image"]),
        build: |line| {
            let service = patched_service(line);
            Some(ProgressEvent::for_service(
                Stage::Patch,
                service.clone(),
                ProgressStatus::Success,
                format!("Microservice {} updated", service),
            ))
        },
    },
    Rule {
        trigger: Trigger::Contains("Error: Could not find microservice for"),
        build: |line| {
            let mut fields = line.split_whitespace();
            while let Some(field) = fields.next() {
                if field == "for" {
                    let service = fields.next()?;
                    return Some(
                        ProgressEvent::for_service(
                            Stage::Patch,
                            service,
                            ProgressStatus::Error,
                            format!("Deployment failed for {}", service),
                        )
                        .with_details("Microservice not found in cluster"),
                    );
                }
            }
            None
        },
    },
    Rule {
        trigger: Trigger::Contains("Deploy: FAILED"),
        build: |_| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Patch,
                    ProgressStatus::Error,
                    "Kubernetes Deployment",
                )
                .with_details("One or more deployments failed"),
            )
        },
    },
    Rule {
        trigger: Trigger::All(&["PARTIAL:", "microservices processed successfully"]),
        build: |_| {
            Some(
                ProgressEvent::stage_level(
                    Stage::Patch,
                    ProgressStatus::Error,
                    "Kubernetes Deployment",
                )
                .with_details("Partial deployment - some services failed"),
            )
        },
    },
];

/// Classify one raw output line
///
/// Trims and ANSI-strips the line, then evaluates the rule table. Returns
/// `None` for any line with no recognized marker; never fails.
pub fn classify(line: &str) -> Option<ProgressEvent> {
    let clean = strip_ansi(line.trim());
    for rule in RULES {
        if rule.trigger.matches(&clean) {
            if let Some(event) = (rule.build)(&clean) {
                return Some(event);
            }
        }
    }
    None
}

/// Remove ANSI color escape sequences from a line
pub fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ANSI pattern"));
    re.replace_all(text, "").into_owned()
}

/// First whitespace-delimited token after `prefix`, with residual ANSI
/// codes stripped. Empty when nothing follows the prefix.
fn service_after(line: &str, prefix: &str) -> String {
    let Some(idx) = line.find(prefix) else {
        return String::new();
    };
    line[idx + prefix.len()..]
        .split_whitespace()
        .next()
        .map(strip_ansi)
        .unwrap_or_default()
}

/// Token following the word "Microservice" in a patch summary line
fn patched_service(line: &str) -> String {
    let mut fields = line.split_whitespace();
    while let Some(field) = fields.next() {
        if field == "Microservice" {
            return fields.next().map(strip_ansi).unwrap_or_default();
        }
    }
    String::new()
}

/// Content of the parenthesized suffix, e.g. "passed! (4 checks)" → "4 checks"
fn parenthesized_suffix(line: &str) -> String {
    match (line.find('('), line.rfind(')')) {
        (Some(start), Some(end)) if end > start => line[start + 1..end].to_string(),
        _ => String::new(),
    }
}

/// The "Step N/M" fragment of a Docker build line
fn docker_step(line: &str) -> String {
    let Some(idx) = line.find("Step ") else {
        return String::new();
    };
    let remaining = &line[idx..];
    match remaining.find(':') {
        Some(end) => remaining[..end].trim_end().to_string(),
        None => String::new(),
    }
}

/// Image id from "Successfully built <id>"
fn docker_image_id(line: &str) -> String {
    let id = token_after(line, "Successfully built ");
    if id.is_empty() {
        String::new()
    } else {
        format!("Image ID: {}", id)
    }
}

/// First token after a literal marker
fn token_after(line: &str, marker: &str) -> String {
    let Some(idx) = line.find(marker) else {
        return String::new();
    };
    line[idx + marker.len()..]
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Content of the first bracketed fragment, e.g. "[registry/service]"
fn bracketed(line: &str) -> String {
    let Some(start) = line.find('[') else {
        return String::new();
    };
    match line[start..].find(']') {
        Some(end) => line[start + 1..start + end].to_string(),
        None => String::new(),
    }
}

/// The bracketed progress bar plus the following size token, e.g.
/// "[=====>   ] 12.3MB/45.6MB"
fn push_progress(line: &str) -> String {
    let Some(start) = line.find('[') else {
        return String::new();
    };
    let Some(end) = line[start..].find(']') else {
        return String::new();
    };
    let bar = &line[start..start + end + 1];
    match line[start + end + 1..].split_whitespace().next() {
        Some(token) => format!("{} {}", bar, token),
        None => bar.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_lines_yield_no_event() {
        for line in [
            "",
            "   ",
            "Cloning into 'repo'...",
            "Downloaded from central: https://repo.maven.org/...",
            "random noise with no markers at all",
            "[INFO] Scanning for projects...",
        ] {
            assert!(classify(line).is_none(), "line should not classify: {line:?}");
        }
    }

    #[test]
    fn test_prerequisites_running() {
        let event = classify("Performing connection checks and prerequisites...").unwrap();
        assert_eq!(event.stage, Stage::Prerequisites);
        assert_eq!(event.status, ProgressStatus::Running);
        assert_eq!(event.message, "Connection Checks & Prerequisites");
        assert_eq!(event.service, "");
    }

    #[test]
    fn test_prerequisites_success_with_details() {
        let event = classify("All prerequisites checks passed! (6 checks in 2s)").unwrap();
        assert_eq!(event.stage, Stage::Prerequisites);
        assert_eq!(event.status, ProgressStatus::Success);
        assert_eq!(event.details.as_deref(), Some("6 checks in 2s"));
    }

    #[test]
    fn test_prerequisites_failure() {
        let event = classify("Prerequisites check failed").unwrap();
        assert_eq!(event.stage, Stage::Prerequisites);
        assert_eq!(event.status, ProgressStatus::Error);
    }

    #[test]
    fn test_settings_updated() {
        let event = classify("Maven Settings XML Updated (backup saved)").unwrap();
        assert_eq!(event.stage, Stage::Settings);
        assert_eq!(event.status, ProgressStatus::Success);
        assert_eq!(event.message, "Maven Settings XML Update");
        assert_eq!(event.details.as_deref(), Some("backup saved"));
    }

    #[test]
    fn test_building_microservice() {
        let event = classify("Building microservice: att-simulator").unwrap();
        assert_eq!(event.stage, Stage::Build);
        assert_eq!(event.service, "att-simulator");
        assert_eq!(event.status, ProgressStatus::Running);
        assert_eq!(event.message, "Building att-simulator");
    }

    #[test]
    fn test_build_completed() {
        let event = classify("Build completed successfully for att-simulator").unwrap();
        assert_eq!(event.stage, Stage::Build);
        assert_eq!(event.service, "att-simulator");
        assert_eq!(event.status, ProgressStatus::Success);
    }

    #[test]
    fn test_stage_level_build_failure() {
        let event = classify("BUILD FAILURE").unwrap();
        assert_eq!(event.stage, Stage::Build);
        assert_eq!(event.service, "");
        assert_eq!(event.status, ProgressStatus::Error);
        assert_eq!(event.message, "Building Microservices");
    }

    #[test]
    fn test_compilation_failure_is_stage_level() {
        let event = classify("[ERROR] Compilation failure: cannot find symbol").unwrap();
        assert_eq!(event.service, "");
        assert_eq!(event.status, ProgressStatus::Error);
    }

    #[test]
    fn test_per_service_build_failure() {
        let line = "Build failed for att-simulator";
        let event = classify(line).unwrap();
        assert_eq!(event.stage, Stage::Build);
        assert_eq!(event.service, "att-simulator");
        assert_eq!(event.status, ProgressStatus::Error);
        assert_eq!(event.details.as_deref(), Some(line));
    }

    #[test]
    fn test_maven_reactor_header() {
        let event = classify("--- Building att-billing 2.1.0 ---").unwrap();
        assert_eq!(event.stage, Stage::Build);
        assert_eq!(event.service, "att-billing");
        assert_eq!(event.message, "Maven building att-billing");
    }

    #[test]
    fn test_docker_step() {
        let event = classify("DOCKER> Step 3/9 : RUN mvn package").unwrap();
        assert_eq!(event.stage, Stage::Deploy);
        assert_eq!(event.status, ProgressStatus::Running);
        assert_eq!(event.message, "Building Docker image");
        assert_eq!(event.details.as_deref(), Some("Step 3/9"));
    }

    #[test]
    fn test_docker_built_and_tagged() {
        let event = classify("DOCKER> Successfully built 4f5c6d7e8a9b").unwrap();
        assert_eq!(event.details.as_deref(), Some("Image ID: 4f5c6d7e8a9b"));

        let event = classify("DOCKER> Successfully tagged registry/att-simulator:1.4.2").unwrap();
        assert_eq!(event.message, "Docker image tagged");
        assert_eq!(event.details.as_deref(), Some("registry/att-simulator:1.4.2"));
    }

    #[test]
    fn test_push_markers() {
        let event = classify("The push refers to repository [registry.local/att-simulator]").unwrap();
        assert_eq!(event.message, "Pushing to registry");
        assert_eq!(event.details.as_deref(), Some("registry.local/att-simulator"));

        let event = classify("7a3b: Pushed").unwrap();
        assert_eq!(event.message, "Uploading layers");

        let event = classify("9c1d: Pushing [=====>     ]  12.3MB/45.6MB").unwrap();
        assert_eq!(event.message, "Uploading to Nexus");
        assert_eq!(event.details.as_deref(), Some("[=====>     ] 12.3MB/45.6MB"));
    }

    #[test]
    fn test_deploying_microservice() {
        let event = classify("Deploying microservice: att-billing").unwrap();
        assert_eq!(event.stage, Stage::Deploy);
        assert_eq!(event.service, "att-billing");
        assert_eq!(event.status, ProgressStatus::Running);
    }

    #[test]
    fn test_docker_image_build_completed_for_service() {
        let event = classify("Docker image build completed successfully for att-billing").unwrap();
        assert_eq!(event.stage, Stage::Deploy);
        assert_eq!(event.service, "att-billing");
        assert_eq!(event.status, ProgressStatus::Success);
    }

    #[test]
    fn test_patched_microservice() {
        let event = classify("Microservice att-simulator patched with new image").unwrap();
        assert_eq!(event.stage, Stage::Patch);
        assert_eq!(event.service, "att-simulator");
        assert_eq!(event.status, ProgressStatus::Success);
        assert_eq!(event.message, "Microservice att-simulator updated");
    }

    #[test]
    fn test_microservice_not_found() {
        let event = classify("Error: Could not find microservice for att-unknown").unwrap();
        assert_eq!(event.stage, Stage::Patch);
        assert_eq!(event.service, "att-unknown");
        assert_eq!(event.status, ProgressStatus::Error);
        assert_eq!(
            event.details.as_deref(),
            Some("Microservice not found in cluster")
        );
    }

    #[test]
    fn test_deploy_failed_summary() {
        let event = classify("Deploy: FAILED").unwrap();
        assert_eq!(event.stage, Stage::Patch);
        assert_eq!(event.status, ProgressStatus::Error);
        assert_eq!(event.message, "Kubernetes Deployment");
    }

    #[test]
    fn test_partial_deploy_summary() {
        let event =
            classify("PARTIAL: 3/5 microservices processed successfully").unwrap();
        assert_eq!(event.stage, Stage::Patch);
        assert_eq!(event.status, ProgressStatus::Error);
        assert_eq!(
            event.details.as_deref(),
            Some("Partial deployment - some services failed")
        );
    }

    #[test]
    fn test_ansi_codes_are_stripped() {
        let event = classify("\x1b[32mBuilding microservice: \x1b[1matt-simulator\x1b[0m").unwrap();
        assert_eq!(event.service, "att-simulator");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Contains both a per-service success marker and the generic
        // "Building" word; the earlier rule must win.
        let event = classify("Build completed successfully for att-a --- Building").unwrap();
        assert_eq!(event.status, ProgressStatus::Success);
        assert_eq!(event.service, "att-a");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
