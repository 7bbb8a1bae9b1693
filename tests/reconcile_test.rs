use anyhow::Result;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

use course_catalog::pipeline::Pipeline;
use course_catalog::storage::{FileStorage, Storage};
use course_catalog::types::CourseRecord;
use course_catalog::Config;

fn course(id: &str, name: &str, deps: &[&str]) -> CourseRecord {
    CourseRecord {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        ..Default::default()
    }
}

const LEGACY: &str = "\
id,course,credits,dependencies,alternative
1,Introduction to Econometrics,4,,
2,Econometrics 2,4,1,
3,Operations Research Methods,4,,
4,Linear Optimization,4,,3
5,Quantitative Finance,4,,9
";

#[test]
fn test_reconcile_rewrites_legacy_table_on_disk() -> Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    let storage = FileStorage::new(root.join("input"), root.join("output"), root.join("programme"));
    storage.save_course("FEB21011X.json", &course("FEB21011X", "Introduction to Econometrics", &[]))?;
    storage.save_course("FEB22002X.json", &course("FEB22002X", "Econometrics 2", &["FEB21011X"]))?;
    storage.save_course("FEB22012X.json", &course("FEB22012X", "Linear Optimisation", &[]))?;
    storage.save_course("FEB22013X.json", &course("FEB22013X", "Operations Research", &[]))?;

    let legacy_path = root.join("legacy.csv");
    fs::write(&legacy_path, LEGACY)?;

    let config = Config::default();
    let pipeline = Pipeline::new(&storage, &config);
    let outcome = pipeline.reconcile(fs::File::open(&legacy_path)?)?;
    outcome.table.write_to(fs::File::create(&legacy_path)?)?;

    let rewritten = fs::read_to_string(&legacy_path)?;
    let lines: Vec<&str> = rewritten.lines().collect();
    assert_eq!(lines[0], "id,course,credits,dependencies,alternative");
    assert_eq!(lines[1], "FEB21011X,Introduction to Econometrics,4,,");
    assert_eq!(lines[2], "FEB22002X,Econometrics 2,4,FEB21011X,");
    assert_eq!(lines[3], "FEB22013X,Operations Research Methods,4,,");
    assert_eq!(lines[4], "FEB22012X,Linear Optimization,4,,FEB22013X");
    // Unmatched rows pass through untouched
    assert_eq!(lines[5], "5,Quantitative Finance,4,,9");

    let report = serde_json::to_value(&outcome.report)?;
    assert_eq!(report["resolved"].as_array().map(Vec::len), Some(4));
    assert_eq!(
        report["unresolved"],
        json!([{ "row": 5, "legacy_id": "5", "name": "Quantitative Finance" }])
    );
    assert_eq!(report["resolved"][3]["kind"], json!("normalized"));
    assert_eq!(report["resolved"][2]["kind"], json!("fuzzy"));
    Ok(())
}

#[test]
fn test_reconcile_is_deterministic() -> Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    let storage = FileStorage::new(root.join("input"), root.join("output"), root.join("programme"));
    storage.save_course("FEB21011X.json", &course("FEB21011X", "Introduction to Econometrics", &[]))?;
    storage.save_course("FEB33001X.json", &course("FEB33001X", "Advanced Econometrics", &[]))?;

    let config = Config::default();
    let pipeline = Pipeline::new(&storage, &config);

    let mut outputs = Vec::new();
    for _ in 0..3 {
        let outcome = pipeline.reconcile("id,course,dependencies,alternative\n1,Econometrics,,\n".as_bytes())?;
        let mut buffer = Vec::new();
        outcome.table.write_to(&mut buffer)?;
        outputs.push(String::from_utf8(buffer)?);
    }

    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
    // Candidates are tried in course file name order
    assert!(outputs[0].contains("FEB21011X,Econometrics"));
    Ok(())
}

#[test]
fn test_reconcile_requires_known_columns() -> Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    let storage = FileStorage::new(root.join("input"), root.join("output"), root.join("programme"));
    storage.save_course("FEB21011X.json", &course("FEB21011X", "Econometrics 1", &[]))?;

    let config = Config::default();
    let result = Pipeline::new(&storage, &config).reconcile("code,title\n1,Econometrics 1\n".as_bytes());
    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_unresolvable_alternative_is_left_in_place() -> Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    let storage = FileStorage::new(root.join("input"), root.join("output"), root.join("programme"));
    storage.save_course("FEB22002X.json", &course("FEB22002X", "Econometrics 2", &["FEB21011X"]))?;

    let config = Config::default();
    let outcome = Pipeline::new(&storage, &config)
        .reconcile("id,course,dependencies,alternative\n8,Econometrics 2,,99\n".as_bytes())?;

    let mut buffer = Vec::new();
    outcome.table.write_to(&mut buffer)?;
    assert_eq!(
        String::from_utf8(buffer)?,
        "id,course,dependencies,alternative\nFEB22002X,Econometrics 2,FEB21011X,99\n"
    );

    let report = serde_json::to_value(&outcome.report)?;
    assert_eq!(report["unresolved_alternatives"], json!([{ "row": 1, "reference": "99" }]));
    assert_eq!(report["unresolved"], json!([]));
    Ok(())
}
