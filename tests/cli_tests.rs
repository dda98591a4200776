use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

use ppidb::config::StoreConfig;
use ppidb::entity::{AttrPath, Entity};
use ppidb::ppi::PpiAttr;
use ppidb::value::Evidence;
use ppidb::{Database, Ppi, Protein};

const SEP3: &str = "MGRGRVELKRIENKINRQVTFAKRRNGLLKKAYELSVLCDAEVALIIFSNRGKLYEFCSS";
const AG: &str = "GRGKIEIKRIENTTNRQVTFCKRRNGLLKKAYELSVLCDAEVALIVFSSRGRLYEYSNNS";
const AP1: &str = "MGRGRVQLKRIENKINRQVTFSKRRAGLLKKAHEISVLCDAEVALVVFSHKGKLFEYST";

fn populate(root: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(StoreConfig::new(root))?;
    let sep3 = Protein::new(SEP3)?;
    let ag = Protein::new(AG)?;
    let ap1 = Protein::new(AP1)?;
    for protein in [&sep3, &ag, &ap1] {
        db.proteins.persist(protein)?;
    }
    let mut positive = Ppi::new(&sep3, &ag);
    positive.add_evidence("Gong_2017", vec![Evidence::Int(1)]);
    db.ppis.persist(&positive)?;
    let mut unknown = Ppi::new(&sep3, &ap1);
    unknown.add_evidence("A", vec![Evidence::Int(1)]);
    unknown.add_evidence("B", vec![Evidence::Int(0)]);
    db.ppis.persist(&unknown)?;
    Ok(())
}

#[test]
fn test_cli_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.arg("--help");
    cmd.assert().success().stdout(predicate::str::contains("evidence consensus"));

    Ok(())
}

#[test]
fn test_cli_requires_a_root() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.arg("stats");
    cmd.assert().failure().stderr(predicate::str::contains("--root"));

    Ok(())
}

#[test]
fn test_cli_consensus() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path().join("db");
    populate(&root)?;

    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.args(["consensus", "--root", root.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("key,p1,p2,p1_uniprot,p2_uniprot,verdict"))
        .stdout(predicate::str::contains(",1\n"))
        .stdout(predicate::str::contains(",?\n"));

    let output_path = temp_dir.path().join("verdicts.csv");
    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.args([
        "consensus",
        "--root",
        root.to_str().unwrap(),
        "--skip-undetermined",
        "--output",
        output_path.to_str().unwrap(),
    ]);
    cmd.assert().success();
    let written = std::fs::read_to_string(&output_path)?;
    assert_eq!(written.lines().count(), 2);
    assert!(!written.contains('?'));

    Ok(())
}

#[test]
fn test_cli_backup_and_restore() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path().join("db");
    populate(&root)?;

    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.args(["backup", "--root", root.to_str().unwrap()]);
    cmd.assert().success().stdout(predicate::str::contains("Backup saved to"));
    assert!(temp_dir.path().join("db.backup").join("PPI").is_dir());

    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.args(["restore", "--root", root.to_str().unwrap(), "--kind", "protein", "--key", SEP3]);
    cmd.assert().success().stdout(predicate::str::contains("Restored Protein"));

    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.args(["restore", "--root", root.to_str().unwrap(), "--kind", "interactor", "--key", "Q6GWV3"]);
    cmd.assert().failure().stderr(predicate::str::contains("No Interactor found"));

    Ok(())
}

#[test]
fn test_cli_stats() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path().join("db");
    populate(&root)?;

    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.args(["stats", "--root", root.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Protein\t3"))
        .stdout(predicate::str::contains("PPI\t2"));

    Ok(())
}

#[test]
fn test_cli_restore_drops_writes_made_after_backup() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path().join("db");
    populate(&root)?;

    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.args(["backup", "--root", root.to_str().unwrap()]);
    cmd.assert().success();

    let key = Ppi::new(&Protein::new(SEP3)?, &Protein::new(AG)?).key().clone();
    {
        let db = Database::open(StoreConfig::new(&root))?;
        let mut ppi = db.ppis.get(&key, &[])?;
        ppi.structure = Some("ATOM".into());
        ppi.add_evidence("Lai_2021", vec![Evidence::Int(0)]);
        db.ppis.persist(&ppi)?;
    }

    let mut cmd = Command::cargo_bin("ppidb")?;
    cmd.args(["restore", "--root", root.to_str().unwrap(), "--kind", "ppi", "--key", &key.to_string()]);
    cmd.assert().success().stdout(predicate::str::contains("Restored PPI"));

    let db = Database::open(StoreConfig::new(&root))?;
    let restored = db.ppis.get(&key, &[AttrPath::whole(PpiAttr::Structure)])?;
    assert!(restored.structure.is_none());
    assert_eq!(restored.origin.as_deref(), Some(&["Gong_2017".to_string()][..]));
    Ok(())
}
