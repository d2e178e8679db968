use std::env;
use std::error::Error;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[path = "src/data.rs"]
mod data_model;
use data_model::KnowledgeData;

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    let data = load_knowledge(&manifest_dir)?;
    let problems = data.integrity_problems();
    if !problems.is_empty() {
        panic!(
            "data/knowledge.json has {} defect(s):\n  {}",
            problems.len(),
            problems.join("\n  ")
        );
    }
    write_knowledge(&data, &out_dir)?;
    Ok(())
}

fn load_knowledge(manifest_dir: &Path) -> Result<KnowledgeData, Box<dyn Error>> {
    let knowledge_file = manifest_dir.join("data/knowledge.json");
    println!("cargo:rerun-if-changed={}", knowledge_file.display());
    if !knowledge_file.exists() {
        panic!("Missing {}.", knowledge_file.display());
    }
    let reader = BufReader::new(File::open(&knowledge_file)?);
    let data: KnowledgeData = serde_json::from_reader(reader)
        .map_err(|err| format!("Failed to parse {}: {err}", knowledge_file.display()))?;
    if data.topics.is_empty() {
        panic!("{} defines no topics", knowledge_file.display());
    }
    Ok(data)
}

fn write_knowledge(data: &KnowledgeData, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let data_path = out_dir.join("knowledge.json");
    fs::write(&data_path, serde_json::to_vec(data)?)?;
    println!("cargo:rustc-env=CABLEBUS_KNOWLEDGE={}", data_path.display());
    Ok(())
}
