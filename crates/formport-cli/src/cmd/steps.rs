use crate::output::{print_json, print_table};
use formport_core::step::PIPELINE;

pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        #[derive(serde::Serialize)]
        struct StepRow {
            step: &'static str,
            requires: Vec<&'static str>,
            output: &'static str,
        }

        let rows: Vec<StepRow> = PIPELINE
            .iter()
            .map(|spec| StepRow {
                step: spec.id.as_str(),
                requires: spec.requires.iter().map(|s| s.as_str()).collect(),
                output: spec.output.rel_template(),
            })
            .collect();
        return print_json(&rows);
    }

    let rows: Vec<Vec<String>> = PIPELINE
        .iter()
        .map(|spec| {
            let requires = if spec.requires.is_empty() {
                "-".to_string()
            } else {
                spec.requires
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            vec![
                spec.id.as_str().to_string(),
                requires,
                spec.output.rel_template().to_string(),
            ]
        })
        .collect();
    print_table(&["STEP", "REQUIRES", "OUTPUT"], rows);
    Ok(())
}
