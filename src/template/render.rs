use std::sync::OnceLock;

use regex::Regex;

use crate::request::params::{ParameterSet, NAME};
use crate::template::expand::evaluate_map;
use crate::template::functions::FunctionNamespace;
use crate::template::MapSpec;

/// Placeholder for the job script's file name, filled in after map substitution
pub const JOB_FILE_NAME_PLACEHOLDER: &str = "[job-file-name]";

/// Expand `map` and substitute each value into its `[key]` placeholders
///
/// Placeholders without a map key are left as they are.
pub fn custom_replace(template: &str, map: &MapSpec, params: &ParameterSet, functions: &FunctionNamespace) -> String {
    let evaluated = evaluate_map(map, params, functions);
    substitute(template, &evaluated)
}

/// Substitute already expanded values, in key order
pub fn substitute(template: &str, evaluated: &MapSpec) -> String {
    evaluated
        .iter()
        .fold(template.to_string(), |text, (key, value)| text.replace(&format!("[{key}]"), value))
}

/// Tabs become single spaces and every line ending becomes `\n`
pub fn normalize(text: &str) -> String {
    static LINE_ENDING: OnceLock<Regex> = OnceLock::new();
    let line_ending = LINE_ENDING.get_or_init(|| Regex::new(r"\r\n?").expect("Valid line ending pattern"));
    line_ending.replace_all(&text.replace('\t', " "), "\n").into_owned()
}

/// `my job-1` becomes `my_job_1.job`
pub fn job_file_name(name: &str) -> String {
    format!("{}.job", name.replace(['-', ' '], "_"))
}

/// Fill in the job file name and normalise an already substituted text
pub fn finish(text: &str, params: &ParameterSet) -> String {
    let job_file = job_file_name(params.get(NAME).unwrap_or_default());
    normalize(&text.replace(JOB_FILE_NAME_PLACEHOLDER, &job_file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::functions::FunctionRegistry;

    #[test]
    fn unknown_placeholders_survive() {
        let registry = FunctionRegistry::new();
        let map: MapSpec = [("cores".to_string(), "-n $cores".to_string())].into_iter().collect();
        let params: ParameterSet = [("cores", "4")].into_iter().collect();

        let text = custom_replace(
            "#SBATCH [cores]\n[undefined_key]\n[cores]",
            &map,
            &params,
            &FunctionNamespace::new(&registry, None),
        );
        assert_eq!(text, "#SBATCH -n 4\n[undefined_key]\n-n 4");
    }

    #[test]
    fn normalisation_removes_tabs_and_carriage_returns() {
        let text = normalize("a\tb\r\nc\rd\n\te");
        assert_eq!(text, "a b\nc\nd\n e");
        assert!(!text.contains('\t') && !text.contains('\r'));
    }

    #[test]
    fn job_file_names() {
        assert_eq!(job_file_name("my job-1"), "my_job_1.job");
        assert_eq!(job_file_name("12345"), "12345.job");
    }

    #[test]
    fn finish_fills_job_file_name() {
        let params: ParameterSet = [("name", "blast-run")].into_iter().collect();
        let text = finish("#!/bin/bash\r\n\tsbatch [job-file-name]\r\n", &params);
        assert_eq!(text, "#!/bin/bash\n sbatch blast_run.job\n");
    }
}
