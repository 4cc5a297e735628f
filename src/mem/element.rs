use crate::mem::data::{DataType, Value};

use serde_json::{json, Map};

/// Opaque metadata attached to an element.
pub type Props = Map<String, serde_json::Value>;

/// Single bit point (coil or discrete input).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Coil {
    address: Option<u16>,
    props: Props,
    value: Option<Value>,
}

/// Word based point (input or holding register).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Register {
    address: Option<u16>,
    r#type: DataType,
    props: Props,
    value: Option<Value>,
}

impl Coil {
    pub fn new(address: u16) -> Self {
        Self {
            address: Some(address),
            ..Default::default()
        }
    }
}

impl Register {
    pub fn new(address: u16, r#type: DataType) -> Self {
        Self {
            address: Some(address),
            r#type,
            ..Default::default()
        }
    }

    pub fn r#type(&self) -> &DataType {
        &self.r#type
    }
}

/// Addressable point of a layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Coil(Coil),
    Register(Register),
}

impl From<Coil> for Element {
    fn from(coil: Coil) -> Self {
        Element::Coil(coil)
    }
}

impl From<Register> for Element {
    fn from(register: Register) -> Self {
        Element::Register(register)
    }
}

impl Element {
    /// Build a coil from a point descriptor `{ address, props? }`.
    pub fn coil(descriptor: &Map<String, serde_json::Value>) -> Self {
        Element::Coil(Coil {
            address: parse_address(descriptor.get("address")),
            props: parse_props(descriptor.get("props")),
            value: None,
        })
    }

    /// Build a register from a point descriptor `{ address, type?, props? }`.
    pub fn register(descriptor: &Map<String, serde_json::Value>) -> Self {
        Element::Register(Register {
            address: parse_address(descriptor.get("address")),
            r#type: parse_type(descriptor.get("type")),
            props: parse_props(descriptor.get("props")),
            value: None,
        })
    }

    /// The address, `None` if the descriptor did not carry a usable one.
    pub fn address(&self) -> Option<u16> {
        match self {
            Element::Coil(c) => c.address,
            Element::Register(r) => r.address,
        }
    }

    pub fn props(&self) -> &Props {
        match self {
            Element::Coil(c) => &c.props,
            Element::Register(r) => &r.props,
        }
    }

    /// The last decoded value, `None` until a successful update.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Element::Coil(c) => c.value.as_ref(),
            Element::Register(r) => r.value.as_ref(),
        }
    }

    pub(crate) fn set_value(&mut self, value: Option<Value>) {
        match self {
            Element::Coil(c) => c.value = value,
            Element::Register(r) => r.value = value,
        }
    }

    pub fn r#type(&self) -> Option<&DataType> {
        match self {
            Element::Coil(_) => None,
            Element::Register(r) => Some(&r.r#type),
        }
    }

    pub fn is_coil(&self) -> bool {
        matches!(self, Element::Coil(_))
    }

    pub fn is_addressable(&self) -> bool {
        self.address().is_some()
    }

    /// Number of addressing units the element occupies, one bit for coils.
    pub fn word_size(&self) -> usize {
        match self {
            Element::Coil(_) => 1,
            Element::Register(r) => r.r#type.word_size(),
        }
    }

    /// `(address, size)` of the element, `None` if it is not addressable.
    pub fn span(&self) -> Option<(usize, usize)> {
        self.address()
            .map(|address| (address as usize, self.word_size()))
    }

    /// Render the element back into its point descriptor.
    pub fn to_descriptor(&self) -> serde_json::Value {
        let mut descriptor = Map::new();
        if let Some(address) = self.address() {
            descriptor.insert("address".to_owned(), json!(address));
        }
        if let Element::Register(r) = self {
            descriptor.insert("type".to_owned(), json!(r.r#type));
        }
        if !self.props().is_empty() {
            descriptor.insert(
                "props".to_owned(),
                serde_json::Value::Object(self.props().clone()),
            );
        }
        serde_json::Value::Object(descriptor)
    }
}

fn parse_address(address: Option<&serde_json::Value>) -> Option<u16> {
    let serde_json::Value::Number(number) = address? else {
        return None;
    };
    if let Some(v) = number.as_u64() {
        return u16::try_from(v).ok();
    }
    number
        .as_f64()
        .filter(|v| v.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(v))
        .map(|v| v as u16)
}

fn parse_props(props: Option<&serde_json::Value>) -> Props {
    match props {
        Some(serde_json::Value::Object(map)) => map.clone(),
        _ => Props::new(),
    }
}

fn parse_type(r#type: Option<&serde_json::Value>) -> DataType {
    use serde_json::Value as Json;
    match r#type {
        None | Some(Json::Null) | Some(Json::Bool(false)) => DataType::default(),
        Some(Json::String(s)) if s.is_empty() => DataType::default(),
        Some(Json::Number(n)) if n.as_f64() == Some(0.0) => DataType::default(),
        Some(Json::String(s)) => s.parse().unwrap_or_default(),
        Some(other) => DataType::Unknown(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{Coil, Element, Register};
    use crate::mem::data::{DataType, Value};
    use serde_json::json;

    fn object(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn ut_coil_from_descriptor() {
        let coil = Element::coil(&object(json!({ "address": 7, "props": { "name": "pump" } })));
        assert!(coil.is_coil());
        assert_eq!(coil.address(), Some(7));
        assert_eq!(coil.props()["name"], json!("pump"));
        assert_eq!(coil.value(), None);
        assert_eq!(coil.r#type(), None);
        assert_eq!(coil.word_size(), 1);
    }

    #[test]
    fn ut_register_defaults() {
        let register = Element::register(&object(json!({ "address": 3 })));
        assert_eq!(register.r#type(), Some(&DataType::UInt16));
        assert!(register.props().is_empty());

        let register = Element::register(&object(json!({ "address": 3, "type": "" })));
        assert_eq!(register.r#type(), Some(&DataType::UInt16));

        let register = Element::register(&object(json!({ "address": 3, "type": "double" })));
        assert_eq!(register.r#type(), Some(&DataType::Double));
        assert_eq!(register.word_size(), 4);
        assert_eq!(register.span(), Some((3, 4)));

        let register = Element::register(&object(json!({ "address": 3, "type": 5 })));
        assert_eq!(register.r#type(), Some(&DataType::Unknown("5".to_owned())));
    }

    #[test]
    fn ut_invalid_address() {
        for descriptor in [
            json!({}),
            json!({ "address": "10" }),
            json!({ "address": -1 }),
            json!({ "address": 1.5 }),
            json!({ "address": 70000 }),
            json!({ "address": null }),
        ] {
            let element = Element::coil(&object(descriptor));
            assert_eq!(element.address(), None);
            assert_eq!(element.span(), None);
            assert!(!element.is_addressable());
        }
        assert_eq!(Element::coil(&object(json!({ "address": 4.0 }))).address(), Some(4));
    }

    #[test]
    fn ut_props_must_be_object() {
        let element = Element::coil(&object(json!({ "address": 1, "props": [1, 2] })));
        assert!(element.props().is_empty());
    }

    #[test]
    fn ut_set_value() {
        let mut element: Element = Register::new(10, DataType::Int16).into();
        element.set_value(Some(Value::I16(-5)));
        assert_eq!(element.value(), Some(&Value::I16(-5)));
        element.set_value(None);
        assert_eq!(element.value(), None);
    }

    #[test]
    fn ut_to_descriptor() {
        let element: Element = Coil::new(2).into();
        assert_eq!(element.to_descriptor(), json!({ "address": 2 }));

        let element = Element::register(&object(
            json!({ "address": 8, "type": "string6", "props": { "unit": "V" } }),
        ));
        assert_eq!(
            element.to_descriptor(),
            json!({ "address": 8, "type": "string6", "props": { "unit": "V" } })
        );
    }
}
