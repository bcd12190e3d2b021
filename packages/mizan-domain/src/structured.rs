use serde_json::Value;

/// Pulls the first well-formed JSON object out of model output that may be wrapped in
/// markdown code fences or surrounding prose. Returns None when nothing parses; callers
/// build their synthetic fallback payloads instead of erroring past this boundary.
pub fn extract_json(text: &str) -> Option<Value> {
	let stripped = strip_code_fences(text);

	if let Ok(value) = serde_json::from_str::<Value>(stripped.trim())
		&& value.is_object()
	{
		return Some(value);
	}

	first_object_slice(&stripped)
		.and_then(|slice| serde_json::from_str::<Value>(slice).ok())
		.filter(Value::is_object)
}

fn strip_code_fences(text: &str) -> String {
	let trimmed = text.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed.to_string();
	};
	// Drop the info string ("json", "JSON", ...) on the opening fence.
	let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
	let rest = rest.strip_suffix("```").unwrap_or(rest);

	rest.trim().to_string()
}

/// First balanced `{ ... }` slice, respecting JSON string escapes.
fn first_object_slice(text: &str) -> Option<&str> {
	let start = text.find('{')?;
	let mut depth = 0usize;
	let mut in_string = false;
	let mut escaped = false;

	for (offset, ch) in text[start..].char_indices() {
		if in_string {
			if escaped {
				escaped = false;
			} else if ch == '\\' {
				escaped = true;
			} else if ch == '"' {
				in_string = false;
			}

			continue;
		}

		match ch {
			'"' => in_string = true,
			'{' => depth += 1,
			'}' => {
				depth -= 1;

				if depth == 0 {
					return Some(&text[start..start + offset + ch.len_utf8()]);
				}
			},
			_ => {},
		}
	}

	None
}
