//! CSS/XPath selector dispatch and element-level CDP operations (spec.md
//! §4.9 "selector dispatch").
//!
//! No script sandbox (spec.md §1 non-goals): element lookup and value
//! extraction run through `Runtime.evaluate`/`Runtime.callFunctionOn`
//! with full page authority, same as `Eval`. Clicks and key input go
//! through the real `Input` domain so they dispatch trusted DOM events
//! indistinguishable from a human driving the page.

use serde_json::{json, Value};

use scout_runtime::Connection;

use crate::error::{ErrorCode, Result, ScoutError};
use crate::session::keys::PhysicalKey;

/// Resolves `selector` (CSS, or XPath when `xpath` is set) against the
/// page's document and returns a `Runtime` remote-object id for the
/// first match, or `NotFound` (spec.md §4.9 "selector dispatch").
pub async fn resolve_object_id(connection: &Connection, target_id: &str, selector: &str, xpath: bool) -> Result<String> {
	let script = if xpath {
		format!(
			"document.evaluate({selector:?}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
		)
	} else {
		format!("document.querySelector({selector:?})")
	};

	let result = evaluate_raw(connection, target_id, &script).await?;
	let object_id = result["result"]["objectId"].as_str();
	match object_id {
		Some(id) => Ok(id.to_string()),
		None => Err(ScoutError::not_found(format!("no element matched selector '{selector}'"))),
	}
}

/// Evaluates `script` with `returnByValue: false`, so callers that need a
/// live DOM reference (selector resolution) get an `objectId` back rather
/// than a JSON snapshot.
async fn evaluate_raw(connection: &Connection, target_id: &str, script: &str) -> Result<Value> {
	connection
		.call_on_target(
			target_id,
			"Runtime.evaluate",
			json!({ "expression": script, "returnByValue": false }),
		)
		.await
		.map_err(ScoutError::from)
}

/// Evaluates arbitrary script and returns its JSON value (spec.md §4.9
/// `Eval`, design notes §9 "opaque JSON string").
pub async fn evaluate_json(connection: &Connection, target_id: &str, script: &str) -> Result<Value> {
	let result = connection
		.call_on_target(
			target_id,
			"Runtime.evaluate",
			json!({ "expression": script, "returnByValue": true, "awaitPromise": true }),
		)
		.await
		.map_err(ScoutError::from)?;

	if let Some(exception) = result.get("exceptionDetails") {
		let message = exception["exception"]["description"]
			.as_str()
			.or_else(|| exception["text"].as_str())
			.unwrap_or("script evaluation failed")
			.to_string();
		return Err(ScoutError::internal("eval", message));
	}

	Ok(result["result"]["value"].clone())
}

/// Invokes a JS function body against a resolved element object
/// (`Runtime.callFunctionOn`), returning its JSON value.
async fn call_on_object(connection: &Connection, target_id: &str, object_id: &str, function_declaration: &str) -> Result<Value> {
	let result = connection
		.call_on_target(
			target_id,
			"Runtime.callFunctionOn",
			json!({
				"objectId": object_id,
				"functionDeclaration": function_declaration,
				"returnByValue": true,
			}),
		)
		.await
		.map_err(ScoutError::from)?;
	Ok(result["result"]["value"].clone())
}

/// The clickable center point of a resolved element, from its CDP box
/// model (`DOM.getBoxModel` via the object's content quad approximated
/// through `getBoundingClientRect`, since this crate talks to elements by
/// `Runtime` object id rather than `DOM` node id).
pub async fn center_point(connection: &Connection, target_id: &str, object_id: &str) -> Result<(f64, f64)> {
	let rect = call_on_object(
		connection,
		target_id,
		object_id,
		"function() { const r = this.getBoundingClientRect(); return { x: r.left + r.width / 2, y: r.top + r.height / 2 }; }",
	)
	.await?;
	let x = rect["x"].as_f64().ok_or_else(|| ScoutError::new(ErrorCode::Internal, "element has no layout box"))?;
	let y = rect["y"].as_f64().unwrap_or(0.0);
	Ok((x, y))
}

/// Dispatches a full mouse click (`mouseMoved` + `mousePressed` +
/// `mouseReleased`) at `(x, y)`.
pub async fn dispatch_click(connection: &Connection, target_id: &str, x: f64, y: f64, button: &str, click_count: u32) -> Result<()> {
	connection
		.call_on_target(target_id, "Input.dispatchMouseEvent", json!({ "type": "mouseMoved", "x": x, "y": y }))
		.await
		.map_err(ScoutError::from)?;
	connection
		.call_on_target(
			target_id,
			"Input.dispatchMouseEvent",
			json!({ "type": "mousePressed", "x": x, "y": y, "button": button, "clickCount": click_count }),
		)
		.await
		.map_err(ScoutError::from)?;
	connection
		.call_on_target(
			target_id,
			"Input.dispatchMouseEvent",
			json!({ "type": "mouseReleased", "x": x, "y": y, "button": button, "clickCount": click_count }),
		)
		.await
		.map_err(ScoutError::from)?;
	Ok(())
}

pub async fn dispatch_hover(connection: &Connection, target_id: &str, x: f64, y: f64) -> Result<()> {
	connection
		.call_on_target(target_id, "Input.dispatchMouseEvent", json!({ "type": "mouseMoved", "x": x, "y": y }))
		.await
		.map_err(ScoutError::from)?;
	Ok(())
}

/// Types `text` into a focused element, one `Input.dispatchKeyEvent`
/// triple per character.
pub async fn type_text(connection: &Connection, target_id: &str, object_id: &str, text: &str, clear_first: bool) -> Result<()> {
	call_on_object(connection, target_id, object_id, "function() { this.focus(); }").await?;

	if clear_first {
		call_on_object(
			connection,
			target_id,
			object_id,
			"function() { if ('value' in this) this.value = ''; }",
		)
		.await?;
	}

	for ch in text.chars() {
		dispatch_key_char(connection, target_id, ch).await?;
	}
	Ok(())
}

async fn dispatch_key_char(connection: &Connection, target_id: &str, ch: char) -> Result<()> {
	let text = ch.to_string();
	connection
		.call_on_target(
			target_id,
			"Input.dispatchKeyEvent",
			json!({ "type": "keyDown", "text": text }),
		)
		.await
		.map_err(ScoutError::from)?;
	connection
		.call_on_target(
			target_id,
			"Input.dispatchKeyEvent",
			json!({ "type": "char", "text": text }),
		)
		.await
		.map_err(ScoutError::from)?;
	connection
		.call_on_target(
			target_id,
			"Input.dispatchKeyEvent",
			json!({ "type": "keyUp", "text": text }),
		)
		.await
		.map_err(ScoutError::from)?;
	Ok(())
}

/// Dispatches a single named/physical key press (spec.md §4.9
/// `PressKey`). A no-op key (spec.md's fallback for unrecognized names)
/// dispatches nothing.
pub async fn press_key(connection: &Connection, target_id: &str, key: &PhysicalKey) -> Result<()> {
	if key.is_noop() {
		return Ok(());
	}

	let mut down = json!({
		"type": "rawKeyDown",
		"key": key.key,
		"code": key.code,
		"windowsVirtualKeyCode": key.windows_virtual_key_code,
	});
	if let Some(text) = &key.text {
		down["text"] = json!(text);
	}
	connection
		.call_on_target(target_id, "Input.dispatchKeyEvent", down)
		.await
		.map_err(ScoutError::from)?;

	if let Some(text) = &key.text {
		connection
			.call_on_target(target_id, "Input.dispatchKeyEvent", json!({ "type": "char", "text": text }))
			.await
			.map_err(ScoutError::from)?;
	}

	connection
		.call_on_target(
			target_id,
			"Input.dispatchKeyEvent",
			json!({ "type": "keyUp", "key": key.key, "code": key.code, "windowsVirtualKeyCode": key.windows_virtual_key_code }),
		)
		.await
		.map_err(ScoutError::from)?;
	Ok(())
}

pub async fn select_option(connection: &Connection, target_id: &str, object_id: &str, value: &str) -> Result<()> {
	let function_declaration = format!(
		"function() {{ this.value = {value:?}; this.dispatchEvent(new Event('change', {{ bubbles: true }})); }}"
	);
	call_on_object(connection, target_id, object_id, &function_declaration).await?;
	Ok(())
}

pub async fn get_text(connection: &Connection, target_id: &str, object_id: &str) -> Result<String> {
	let value = call_on_object(
		connection,
		target_id,
		object_id,
		"function() { return this.innerText ?? this.textContent ?? ''; }",
	)
	.await?;
	Ok(value.as_str().unwrap_or_default().to_string())
}

pub async fn get_attribute(connection: &Connection, target_id: &str, object_id: &str, attribute: &str) -> Result<Option<String>> {
	let function_declaration = format!("function() {{ return this.getAttribute({attribute:?}); }}");
	let value = call_on_object(connection, target_id, object_id, &function_declaration).await?;
	Ok(value.as_str().map(str::to_string))
}
