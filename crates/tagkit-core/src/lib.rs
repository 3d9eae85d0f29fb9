use indexmap::IndexMap;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};
use tagkit_attrs::{attrs_from_value, AttrError, HtmlEscaper, Value};
use tagkit_template::{Body, RenderContext, Tag, TagDefinition};

fn value_error(error: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(error.to_string())
}

/// Convert a Python object into a template value.
///
/// Objects with an `__html__` method (e.g. `markupsafe.Markup`) become safe strings.
fn to_value(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    if obj.is_none() {
        return Ok(Value::Null);
    }
    // `bool` is a subclass of `int`, so it goes first
    if obj.is_instance_of::<PyBool>() {
        return Ok(Value::Bool(obj.extract::<bool>()?));
    }
    if obj.is_instance_of::<PyInt>() {
        return match obj.extract::<i64>() {
            Ok(i) => Ok(Value::Int(i)),
            Err(_) => Ok(Value::Float(obj.extract::<f64>()?)),
        };
    }
    if obj.is_instance_of::<PyFloat>() {
        return Ok(Value::Float(obj.extract::<f64>()?));
    }
    if obj.hasattr("__html__")? {
        let html = obj.call_method0("__html__")?.extract::<String>()?;
        return Ok(Value::safe(html));
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(Value::Str(obj.extract::<String>()?));
    }
    if let Ok(dict) = obj.cast::<PyDict>() {
        let mut map = IndexMap::with_capacity(dict.len());
        for (key, value) in dict.iter() {
            map.insert(key.str()?.to_string(), to_value(&value)?);
        }
        return Ok(Value::Map(map));
    }
    if obj.is_instance_of::<PyList>() || obj.is_instance_of::<PyTuple>() {
        let items = obj
            .try_iter()?
            .map(|item| to_value(&item?))
            .collect::<PyResult<Vec<_>>>()?;
        return Ok(Value::List(items));
    }

    Err(PyValueError::new_err(format!(
        "Unsupported attribute value of type '{}'",
        obj.get_type().name()?
    )))
}

/// Serialize a list of attributes into an HTML attribute string.
///
/// ```python
/// serialize_attributes(["checked", {"class": ["a", "b"], "id": "x"}])
/// # 'checked class="a b" id="x"'
/// ```
#[pyfunction]
fn serialize_attributes(attrs: &Bound<'_, PyAny>) -> PyResult<String> {
    let value = to_value(attrs)?;
    let items = attrs_from_value(&value).map_err(value_error)?;
    Ok(tagkit_attrs::serialize_attributes(&items, &HtmlEscaper))
}

/// Render one invocation of a tag named `name` with the HTML escaper
#[pyfunction]
#[pyo3(signature = (name, attrs, body=None, is_block=true))]
fn render_tag(
    name: &str,
    attrs: &Bound<'_, PyAny>,
    body: Option<String>,
    is_block: bool,
) -> PyResult<String> {
    let tag = TagDefinition::new(name, is_block).map_err(value_error)?;
    let args = match to_value(attrs)? {
        Value::List(items) => items,
        other => return Err(value_error(AttrError::not_a_sequence(&other))),
    };

    let ctx = RenderContext::without_locals(&HtmlEscaper);
    let html = tag
        .invoke(&ctx, &args, Body::from(body))
        .map_err(value_error)?;
    Ok(html.into_string())
}

/// A Python module implemented in Rust for rendering custom tags.
#[pymodule]
fn tagkit_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(serialize_attributes, m)?)?;
    m.add_function(wrap_pyfunction!(render_tag, m)?)?;
    Ok(())
}
