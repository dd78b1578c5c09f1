use serde_json::Value;

/// Outcome of reading one field out of a loosely-typed webhook object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<T> {
    Missing,
    WrongType,
    Present(T),
}

impl<T> Lookup<T> {
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Missing | Self::WrongType => None,
        }
    }

    fn and_then<U>(self, next: impl FnOnce(T) -> Lookup<U>) -> Lookup<U> {
        match self {
            Self::Present(value) => next(value),
            Self::Missing => Lookup::Missing,
            Self::WrongType => Lookup::WrongType,
        }
    }
}

fn field<'a>(value: &'a Value, key: &str) -> Lookup<&'a Value> {
    let Some(object) = value.as_object() else {
        return Lookup::WrongType;
    };
    match object.get(key) {
        None | Some(Value::Null) => Lookup::Missing,
        Some(inner) => Lookup::Present(inner),
    }
}

pub fn array_field<'a>(value: &'a Value, key: &str) -> Lookup<&'a Vec<Value>> {
    field(value, key).and_then(|inner| match inner.as_array() {
        Some(array) => Lookup::Present(array),
        None => Lookup::WrongType,
    })
}

pub fn str_field<'a>(value: &'a Value, key: &str) -> Lookup<&'a str> {
    field(value, key).and_then(|inner| match inner.as_str() {
        Some(text) => Lookup::Present(text),
        None => Lookup::WrongType,
    })
}

/// Numbers arrive either as JSON numbers or as decimal strings depending on
/// the provider; both are accepted.
pub fn number_field(value: &Value, key: &str) -> Lookup<f64> {
    field(value, key).and_then(|inner| {
        if let Some(number) = inner.as_f64() {
            return Lookup::Present(number);
        }
        match inner.as_str().map(|text| text.trim().parse::<f64>()) {
            Some(Ok(number)) => Lookup::Present(number),
            _ => Lookup::WrongType,
        }
    })
}

/// Walks nested objects. Every intermediate segment must be an object.
pub fn path<'a>(value: &'a Value, segments: &[&str]) -> Lookup<&'a Value> {
    let mut current = value;
    for segment in segments {
        match field(current, segment) {
            Lookup::Present(inner) => current = inner,
            Lookup::Missing => return Lookup::Missing,
            Lookup::WrongType => return Lookup::WrongType,
        }
    }
    Lookup::Present(current)
}
