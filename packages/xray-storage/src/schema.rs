pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

/// Inlines `\ir` directives so the schema can be applied statement by statement.
fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		match line.trim().strip_prefix("\\ir ").map(str::trim) {
			Some("tables/001_runs.sql") =>
				out.push_str(include_str!("../../../sql/tables/001_runs.sql")),
			Some("tables/002_steps.sql") =>
				out.push_str(include_str!("../../../sql/tables/002_steps.sql")),
			Some("tables/003_candidates.sql") =>
				out.push_str(include_str!("../../../sql/tables/003_candidates.sql")),
			_ => out.push_str(line),
		}

		out.push('\n');
	}

	out
}
