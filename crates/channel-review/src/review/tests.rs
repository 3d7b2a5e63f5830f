use super::*;
use crate::api::{Finding, ValidationResult};
use crate::differ::RepositoryScan;

fn set(items: &[&str]) -> std::collections::BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn passed() -> RunResult {
    ValidationResult::new().into_run_result()
}

fn with_findings(errors: &[&str], warnings: &[&str]) -> RunResult {
    let mut r = ValidationResult::new();
    for e in errors {
        r.error(*e);
    }
    for w in warnings {
        r.warning(*w);
    }
    r.into_run_result()
}

#[test]
fn full_report_layout() {
    let diff = DiffSet {
        removed_repositories: set(&["https://gone.example/r.json"]),
        added_repositories: set(&["http://plain.example/r.json"]),
        repository_scans: vec![RepositoryScan {
            url: "http://plain.example/r.json".into(),
            errors: vec![
                "External repositories added to the default channel must be served over HTTPS"
                    .into(),
            ],
            package_count: Some(1),
        }],
        removed: set(&["Old"]),
        modified: set(&["Changed"]),
        added: set(&["Fine", "Shaky"]),
        ..DiffSet::default()
    };
    let mut shaky = ValidationResult::new();
    shaky.push(Finding::error("Broken thing").with_details(["first", "second"]));
    shaky.warning("Minor thing");
    let results = BTreeMap::from([
        ("Fine".to_string(), passed()),
        ("Shaky".to_string(), shaky.into_run_result()),
    ]);

    let (lines, errors, warnings) = compose_report(&diff, &results);
    assert!(errors && warnings);
    assert_eq!(
        lines,
        vec![
            "Repositories removed:",
            "  - https://gone.example/r.json",
            "",
            "Repositories added:",
            "  - http://plain.example/r.json",
            "",
            "Processing repository \"http://plain.example/r.json\"",
            "  - ERROR: External repositories added to the default channel must be served over HTTPS",
            "  - Found 1 package",
            "",
            "Packages removed:",
            "  - Old",
            "",
            "Packages modified:",
            "  - Changed",
            "",
            "Packages added:",
            "  - Fine",
            "  - Shaky",
            "",
            "Processing package \"Fine\"",
            "  - All checks passed",
            "",
            "Processing package \"Shaky\"",
            "  - ERROR: Broken thing",
            "    - first",
            "    - second",
            "  - WARNING: Minor thing",
        ]
    );
}

#[test]
fn verdicts_follow_findings() {
    let diff = DiffSet {
        added: set(&["A"]),
        ..DiffSet::default()
    };
    let policy = ReviewPolicyConfig::default();

    let ok = compose(&diff, &BTreeMap::from([("A".into(), passed())]), &policy);
    assert_eq!(ok.verdict, ReviewVerdict::Success);

    let warn = compose(
        &diff,
        &BTreeMap::from([("A".into(), with_findings(&[], &["w"]))]),
        &policy,
    );
    assert_eq!(warn.verdict, ReviewVerdict::Warning);

    let err = compose(
        &diff,
        &BTreeMap::from([("A".into(), with_findings(&["e"], &["w"]))]),
        &policy,
    );
    assert_eq!(err.verdict, ReviewVerdict::Error);
    for review in [ok, warn, err] {
        assert_eq!(review.event, ReviewEvent::RequestChanges);
    }
}

#[test]
fn by_verdict_policy_maps_events() {
    use ReviewVerdict::*;
    let p = ReviewEventPolicy::ByVerdict;
    assert_eq!(ReviewEvent::for_verdict(p, Error), ReviewEvent::RequestChanges);
    assert_eq!(ReviewEvent::for_verdict(p, Warning), ReviewEvent::Comment);
    assert_eq!(ReviewEvent::for_verdict(p, Success), ReviewEvent::Approve);
    assert_eq!(
        ReviewEvent::for_verdict(ReviewEventPolicy::RequestChanges, Success),
        ReviewEvent::RequestChanges
    );
}

#[test]
fn comment_with_single_link_and_help() {
    let diff = DiffSet {
        added: set(&["Pkg"]),
        links: BTreeMap::from([("Pkg".to_string(), "https://github.com/o/Pkg".to_string())]),
        ..DiffSet::default()
    };
    let results = BTreeMap::from([("Pkg".to_string(), with_findings(&[], &["w"]))]);
    let review = compose(&diff, &results, &ReviewPolicyConfig::default());
    let expected = [
        "### Automated testing result: WARNING",
        "",
        "Repo link: [Pkg](https://github.com/o/Pkg)",
        "[Results help](https://github.com/packagecontrol/st_package_reviewer/wiki/Package-checks)",
        "",
        "```",
        "Packages added:",
        "  - Pkg",
        "",
        "Processing package \"Pkg\"",
        "  - WARNING: w",
        "```",
    ]
    .join("\n");
    assert_eq!(review.body, expected);
}

#[test]
fn comment_lists_several_links_in_name_order() {
    let diff = DiffSet {
        added: set(&["B", "A", "C"]),
        links: BTreeMap::from([
            ("B".to_string(), "https://x/B".to_string()),
            ("A".to_string(), "https://x/A".to_string()),
        ]),
        ..DiffSet::default()
    };
    let results = BTreeMap::from([
        ("A".to_string(), passed()),
        ("B".to_string(), passed()),
        ("C".to_string(), passed()),
    ]);
    let review = compose(&diff, &results, &ReviewPolicyConfig::default());
    assert!(review.body.starts_with(
        "### Automated testing result: SUCCESS\n\nRepo links:\n\n  - [A](https://x/A)\n  - [B](https://x/B)\n\n```\n"
    ));
    assert!(!review.body.contains("Results help"));
}

#[test]
fn empty_diff_has_no_report_block() {
    let review = compose(
        &DiffSet::default(),
        &BTreeMap::new(),
        &ReviewPolicyConfig::default(),
    );
    assert_eq!(review.body, "### Automated testing result: SUCCESS\n");
    assert!(review.report.is_empty());
}

#[test]
fn dry_run_writes_body() {
    let review = compose(
        &DiffSet::default(),
        &BTreeMap::new(),
        &ReviewPolicyConfig::default(),
    );
    let publisher = DryRun::new(Vec::new());
    publisher
        .publish("https://api.github.com/repos/o/r/pulls/7/", &review)
        .expect("dry run");
    let text = String::from_utf8(publisher.into_inner()).expect("utf8");
    assert!(text.starts_with(
        "POST https://api.github.com/repos/o/r/pulls/7/reviews (REQUEST_CHANGES)\n### Automated"
    ));
}

#[test]
fn payload_uses_api_event_names() {
    let v = serde_json::to_value(ReviewPayload {
        body: "hi",
        event: ReviewEvent::RequestChanges,
    })
    .expect("encode");
    assert_eq!(v, serde_json::json!({"body": "hi", "event": "REQUEST_CHANGES"}));
}

#[test]
fn publish_errors_render_like_the_service() {
    assert_eq!(
        PublishError::Status(201).to_string(),
        "Error posting review to PR - 201"
    );
    assert_eq!(
        PublishError::Rejected {
            message: "HTTP Error 422: Unprocessable Entity".into(),
            body: "{\"message\":\"Validation Failed\"}".into(),
        }
        .to_string(),
        "Error posting review to PR - HTTP Error 422: Unprocessable Entity (response: {\"message\":\"Validation Failed\"})"
    );
}
