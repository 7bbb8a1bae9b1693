use anyhow::Result;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use course_catalog::pipeline::Pipeline;
use course_catalog::storage::{FileStorage, Storage};
use course_catalog::Config;

fn header(code: &str, name: &str) -> Value {
    json!({ "rubriek": "rubriek-kop", "velden": [
        { "veld": "cursus", "titel": "Course", "waarde": code },
        { "veld": "cursus_korte_naam", "titel": "Name", "waarde": name },
        { "veld": "deeplink_detailscherm_extern", "waarde": format!("https://example.edu/{}", code) }
    ]})
}

fn body(credits: &str, content: &str, block: &str) -> Vec<Value> {
    vec![
        json!({ "rubriek": "rubriek-zoek", "velden": [
            { "veld": "studiepunten", "titel": "Study points", "waarde": credits }
        ]}),
        json!({ "rubriek": "rubriek-inhoud", "velden": [
            { "veld": "item-inhoud-1", "waarde": content }
        ]}),
        json!({ "rubriek": "rubriek-inschrijven", "velden": [
            { "veld": "tabel-inschrijfperiodes", "waarde": [ { "omschrijving": block } ] }
        ]}),
    ]
}

fn write_record(dir: &Path, file: &str, items: Vec<Value>) -> Result<()> {
    fs::write(dir.join(file), serde_json::to_vec_pretty(&json!({ "items": items }))?)?;
    Ok(())
}

fn seed_inputs(input: &Path) -> Result<()> {
    fs::create_dir_all(input)?;

    let mut first = vec![header("FEB21011X", "Introduction to Econometrics")];
    first.extend(body("4 EC", "<p>No prior knowledge needed.</p>", "Block BLOK1"));
    write_record(input, "FEB21011X.json", first)?;

    let mut second = vec![header("FEB22002X", "Econometrics 2")];
    second.extend(body(
        "4",
        "<p>Builds on <strong>FEB21011X</strong>. This course is required for FEB23004X.</p>",
        "Block BLOK2 until Block BLOK3",
    ));
    write_record(input, "FEB22002X.json", second)?;

    write_record(
        input,
        "FEB99999X.json",
        body("6 EC", "Requires FEB21011X", "Block BLOK4"),
    )?;
    Ok(())
}

#[test]
fn test_extract_categories_aggregate_end_to_end() -> Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    let input = root.join("input");
    seed_inputs(&input)?;

    let storage = FileStorage::new(&input, root.join("output"), root.join("programme"));
    let config = Config::default();
    let pipeline = Pipeline::new(&storage, &config);

    let extracted = pipeline.extract()?;
    assert_eq!(extracted.total_records, 3);
    assert_eq!(extracted.extracted, 3);
    assert_eq!(extracted.without_id, 1);
    assert!(extracted.errors.is_empty());

    // Course records land under the same file name
    let course: Value = serde_json::from_slice(&fs::read(root.join("output/FEB22002X.json"))?)?;
    assert_eq!(course["id"], json!("FEB22002X"));
    assert_eq!(course["blockStart"], json!("BLOK2"));
    assert_eq!(course["blockEnd"], json!("BLOK3"));
    assert_eq!(course["dependencies"], json!(["FEB21011X"]));
    let orphan: Value = serde_json::from_slice(&fs::read(root.join("output/FEB99999X.json"))?)?;
    assert_eq!(orphan["id"], json!("Unknown"));
    assert_eq!(orphan["credits"], json!(6));

    let flags = "id,core,qf,or,econ,marketing,extracurricular\n\
                 FEB21011X,false,false,false,true,false,false\n\
                 FEB22002X,true,false,false,false,false,false\n";
    let categories = pipeline.build_categories(flags.as_bytes())?;
    assert_eq!(categories.names().count(), 6);
    assert!(root.join("programme/core.json").exists());
    let core: Value = serde_json::from_slice(&fs::read(root.join("programme/core.json"))?)?;
    assert_eq!(core, json!([{ "requirement": ["FEB22002X"] }]));

    let mut out = Vec::new();
    let result = pipeline.aggregate(&mut out)?;
    assert_eq!(result.total_courses, 3);
    assert_eq!(result.rows_written, 2);
    assert_eq!(result.skipped, 1);

    let text = String::from_utf8(out)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[1],
        "FEB21011X,Introduction to Econometrics,4,BLOK1,BLOK1,false,false,false,false,true,false,,false,,"
    );
    assert_eq!(
        lines[2],
        "FEB22002X,Econometrics 2,4,BLOK2,BLOK3,false,true,false,false,false,false,FEB21011X,false,,"
    );
    Ok(())
}

#[test]
fn test_alternative_pair_is_listed_in_aggregate() -> Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    let input = root.join("input");
    fs::create_dir_all(&input)?;
    write_record(&input, "FEB21020X.json", vec![header("FEB21020X", "Stochastic Processes")])?;
    write_record(&input, "FEB22017X.json", vec![header("FEB22017X", "Financial Models")])?;

    let storage = FileStorage::new(&input, root.join("output"), root.join("programme"));
    let config = Config::default();
    let pipeline = Pipeline::new(&storage, &config);
    pipeline.extract()?;

    let flags = "id,qf\nFEB21020X,true\nFEB22017X,TRUE\n";
    let categories = pipeline.build_categories(flags.as_bytes())?;
    let qf = categories.get("qf").expect("qf category");
    assert_eq!(qf.requirements.len(), 1);
    assert_eq!(qf.requirements[0].alternatives, vec!["FEB22017X", "FEB21020X"]);

    let reloaded = pipeline.load_categories()?;
    assert_eq!(reloaded.get("qf"), Some(qf));

    let mut out = Vec::new();
    pipeline.aggregate(&mut out)?;
    let text = String::from_utf8(out)?;
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[1].starts_with("FEB21020X,Stochastic Processes,"));
    assert!(lines[1].ends_with(",FEB22017X,"));
    assert!(lines[2].ends_with(",FEB21020X,"));
    Ok(())
}

#[test]
fn test_validate_flags_mismatched_and_malformed_files() -> Result<()> {
    let temp_dir = tempdir()?;
    let dir = temp_dir.path();
    write_record(dir, "FEB21011X.json", vec![header("FEB21011X", "Econometrics 1")])?;
    write_record(dir, "FEB22002X.json", vec![header("FEB22002Y", "Econometrics 2")])?;
    fs::write(dir.join("FEB30000X.json"), "not json")?;

    let storage = FileStorage::new(dir, dir.join("out"), dir.join("programme"));
    let config = Config::default();
    let report = Pipeline::new(&storage, &config).validate()?;

    assert!(!report.all_valid());
    let statuses: Vec<Value> = report
        .results
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(statuses[0]["status"], json!("OK"));
    assert_eq!(statuses[1]["status"], json!("MISMATCH"));
    assert_eq!(statuses[1]["expected"], json!("FEB22002X"));
    assert_eq!(statuses[1]["actual"], json!("FEB22002Y"));
    assert_eq!(statuses[2]["status"], json!("ERROR"));
    assert_eq!(report.failures().count(), 2);

    // Validation reads only; nothing is written
    assert!(!dir.join("out").exists());
    assert_eq!(storage.raw_sources()?.len(), 3);
    Ok(())
}

#[test]
fn test_failed_aggregate_leaves_course_table_intact() -> Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    let course_table = root.join("course.csv");
    let flags = "id,core\nFEB22002X,true\n";
    fs::write(&course_table, flags)?;

    // Nothing has been extracted yet, so the course directory is missing
    let storage = FileStorage::new(root.join("input"), root.join("output"), root.join("programme"));
    let config = Config::default();
    let pipeline = Pipeline::new(&storage, &config);

    assert!(pipeline.aggregate_to_file(&course_table).is_err());
    assert_eq!(fs::read_to_string(&course_table)?, flags);
    Ok(())
}

#[test]
fn test_aggregate_to_file_replaces_flag_table() -> Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    let input = root.join("input");
    seed_inputs(&input)?;
    let course_table = root.join("course.csv");
    fs::write(&course_table, "id,core\nFEB22002X,true\n")?;

    let storage = FileStorage::new(&input, root.join("output"), root.join("programme"));
    let config = Config::default();
    let pipeline = Pipeline::new(&storage, &config);
    pipeline.extract()?;
    pipeline.build_categories(fs::File::open(&course_table)?)?;

    let result = pipeline.aggregate_to_file(&course_table)?;
    assert_eq!(result.rows_written, 2);

    let written = fs::read_to_string(&course_table)?;
    assert!(written.starts_with("id,course,credits,block_start,block_end,premaster,core,"));
    assert!(written.contains("FEB22002X,Econometrics 2,4,BLOK2,BLOK3,false,true,"));
    Ok(())
}
