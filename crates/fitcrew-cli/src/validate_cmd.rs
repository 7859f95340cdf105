use std::path::Path;

use anyhow::{Context, Result, bail};

use fitcrew_core::extract::extract_json_object;
use fitcrew_core::tools::check_final_plan;

/// Execute `fitcrew validate`: check a plan file against the FinalPlan shape.
///
/// With `extract`, the file may be raw model output and the first-to-last
/// brace span is checked instead.
pub fn run_validate(path: &Path, extract: bool) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let json = if extract {
        match extract_json_object(&text) {
            Some(json) => json,
            None => bail!("no JSON object found in {}", path.display()),
        }
    } else {
        text.as_str()
    };

    let check = check_final_plan(json);
    if !check.is_valid() {
        bail!("{}", check.message());
    }
    println!("{}", check.message());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitcrew_test_utils::final_plan_json;

    fn write(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("plan.json");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn accepts_valid_plan() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write(&tmp, &final_plan_json().to_string());
        run_validate(&path, false).unwrap();
    }

    #[test]
    fn names_missing_section() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut plan = final_plan_json();
        plan.as_object_mut().unwrap().remove("nutrition_guidelines");
        let path = write(&tmp, &plan.to_string());

        let msg = run_validate(&path, false).unwrap_err().to_string();
        assert!(msg.contains("nutrition_guidelines"), "unexpected error: {msg}");
    }

    #[test]
    fn extract_mode_strips_prose() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write(&tmp, &format!("Final plan:\n{}\nEnjoy!", final_plan_json()));
        assert!(run_validate(&path, false).is_err());
        run_validate(&path, true).unwrap();
    }
}
