use crate::convert::{self, FileType};
use crate::error::LayoutError;
use crate::mem::buffer;
use crate::mem::element::Element;
use crate::mem::range::Range;

use clap::ValueEnum;
use serde_json::Map;
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, error, warn};

/// The four address spaces of a Modbus device.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Coils,
    Discrete,
    Input,
    Holding,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Coils,
        Category::Discrete,
        Category::Input,
        Category::Holding,
    ];

    /// Key of the category in a layout configuration.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Coils => "coils",
            Category::Discrete => "discrete",
            Category::Input => "input",
            Category::Holding => "holding",
        }
    }

    /// Whether the category is addressed in bits rather than words.
    pub fn is_bit(&self) -> bool {
        matches!(self, Category::Coils | Category::Discrete)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Category::Coils | Category::Holding)
    }

    fn index(&self) -> usize {
        match self {
            Category::Coils => 0,
            Category::Discrete => 1,
            Category::Input => 2,
            Category::Holding => 3,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.key())
    }
}

/// Elements of all four categories together with the address range to poll per category.
///
/// Ranges are computed once on construction. A category without addressable elements has no
/// range and is not polled.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    elements: [Vec<Element>; 4],
    ranges: [Option<Range>; 4],
}

impl Layout {
    /// Build a layout from a configuration mapping `{ coils, discrete, input, holding }`.
    ///
    /// Missing categories (or ones that are not arrays) are empty.
    pub fn from_value(config: &serde_json::Value) -> Result<Self, LayoutError> {
        let config = config
            .as_object()
            .ok_or_else(|| LayoutError::InvalidLayout(String::from("layout must be an object")))?;

        let mut elements: [Vec<Element>; 4] = Default::default();
        for category in Category::ALL {
            elements[category.index()] = Self::map_elements(category, config)?;
        }
        Ok(Self::new(elements))
    }

    fn map_elements(
        category: Category,
        config: &Map<String, serde_json::Value>,
    ) -> Result<Vec<Element>, LayoutError> {
        let Some(descriptors) = config.get(category.key()).and_then(|v| v.as_array()) else {
            return Ok(Vec::new());
        };

        descriptors
            .iter()
            .enumerate()
            .map(|(idx, descriptor)| {
                let descriptor = descriptor.as_object().ok_or_else(|| {
                    LayoutError::InvalidLayout(format!("{category}[{idx}] is not an object"))
                })?;
                Ok(if category.is_bit() {
                    Element::coil(descriptor)
                } else {
                    Element::register(descriptor)
                })
            })
            .collect()
    }

    fn new(elements: [Vec<Element>; 4]) -> Self {
        let mut ranges = [None; 4];
        for category in Category::ALL {
            let unaddressable = elements[category.index()]
                .iter()
                .filter(|e| !e.is_addressable())
                .count();
            if unaddressable > 0 {
                warn!("{unaddressable} {category} elements have no valid address, not polled");
            }
            let range = Range::spanning(elements[category.index()].iter().filter_map(|e| e.span()));
            match range {
                Some(r) => debug!("Polling range of {category} is {r}"),
                None => debug!("No addressable elements in {category}"),
            }
            ranges[category.index()] = range;
        }
        Self { elements, ranges }
    }

    /// Read a layout from a JSON or TOML file, chosen by extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let config: serde_json::Value = convert::read(path, FileType::from_path(path))?;
        Self::from_value(&config)
    }

    /// Read a layout from a file, logging the failure and returning `None` if it cannot be
    /// loaded.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(layout) => Some(layout),
            Err(e) => {
                error!("Failed to load layout from {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn elements(&self, category: Category) -> &[Element] {
        &self.elements[category.index()]
    }

    pub fn range(&self, category: Category) -> Option<Range> {
        self.ranges[category.index()]
    }

    /// First element of a category at the given address.
    pub fn find(&self, category: Category, address: u16) -> Option<&Element> {
        self.elements(category)
            .iter()
            .find(|e| e.address() == Some(address))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &Element)> {
        Category::ALL
            .into_iter()
            .flat_map(move |c| self.elements(c).iter().map(move |e| (c, e)))
    }

    pub fn len(&self) -> usize {
        self.elements.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the raw buffer read for the range of a category into its elements.
    ///
    /// Bit categories expect a bit-packed buffer, word categories a big-endian word buffer. A
    /// missing buffer leaves the elements untouched.
    pub fn apply(&mut self, category: Category, bytes: Option<&[u8]>) {
        let Some(range) = self.ranges[category.index()] else {
            return;
        };
        let elements = &mut self.elements[category.index()];
        if category.is_bit() {
            buffer::parse_coils(range.start, bytes, elements);
        } else {
            buffer::parse_registers(range.start, bytes, elements);
        }
    }

    /// Write the configuration mapping of the layout to a JSON or TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P, file_type: FileType) -> Result<(), LayoutError> {
        convert::write(path, file_type, &self.to_config())
    }

    /// Render the layout back into its configuration mapping.
    pub fn to_config(&self) -> serde_json::Value {
        let config: Map<String, serde_json::Value> = Category::ALL
            .into_iter()
            .map(|c| {
                (
                    c.key().to_owned(),
                    serde_json::Value::Array(
                        self.elements(c).iter().map(Element::to_descriptor).collect(),
                    ),
                )
            })
            .collect();
        serde_json::Value::Object(config)
    }
}
