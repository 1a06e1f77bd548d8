use anyhow::Result;

use super::Paths;
use crate::pipeline;
use crate::types::Identifier;

pub fn run(paths: &Paths, user: &str, item: &str) -> Result<()> {
    let user = Identifier::parse(user);
    let item = Identifier::parse(item);
    let p = pipeline::score(&paths.data_dir, &paths.model_dir, &user, &item)?;
    println!("{p:.6}");
    Ok(())
}
