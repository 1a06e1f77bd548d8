use anyhow::Result;

use super::Paths;
use crate::dataset::{self, DATASET_FILE};
use crate::export;
use crate::mapping::file::MAPPING_FILE;
use crate::mapping::MappingFile;
use crate::model::manifest::{ModelManifest, MANIFEST_FILE};

pub fn run(paths: &Paths) -> Result<()> {
    let mapping_path = paths.data_dir.join(MAPPING_FILE);
    if !mapping_path.exists() {
        println!("No mapping. Run 'cinematch extract' to create.");
        return Ok(());
    }

    match MappingFile::load(&paths.data_dir) {
        Ok((users, items)) => {
            println!("mapping: {} users, {} items", users.len(), items.len());
            if paths.data_dir.join(DATASET_FILE).exists() {
                match dataset::load(&paths.data_dir, &users, &items) {
                    Ok(ds) => println!("dataset: {} interactions", ds.len()),
                    Err(e) => println!("dataset: invalid ({e})"),
                }
            } else {
                println!("dataset: missing");
            }
        }
        Err(e) => println!("mapping: invalid ({e})"),
    }

    if paths.model_dir.join(MANIFEST_FILE).exists() {
        match ModelManifest::load(&paths.model_dir) {
            Ok(m) => {
                let loss = m
                    .final_loss
                    .map(|l| format!("{l:.4}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "model: {} epochs, final loss {loss}, dim {}",
                    m.epochs, m.shape.output_dim
                );
            }
            Err(e) => println!("model: invalid ({e})"),
        }
    } else {
        println!("model: not trained -- run 'cinematch train'");
    }

    match export::load(&paths.export_dir) {
        Ok(records) => println!("export: {} records", records.len()),
        Err(_) => println!("export: missing"),
    }

    Ok(())
}
