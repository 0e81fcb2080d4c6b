use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{FieldDescriptor, Refinement, Schema, TextFormat};
use crate::error::SchemaError;
use crate::parser::parse_schema_document;

/// Registry of known schemas by reference (`schema:<name>`)
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        SchemaRegistry {
            schemas: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in schemas
    pub fn with_builtins() -> Result<Self, SchemaError> {
        let mut registry = SchemaRegistry {
            schemas: HashMap::with_capacity(8),
        };
        for schema in builtin_schemas()? {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    /// Register a schema under `schema:<name>`.
    ///
    /// The declaration is checked first; registering the same name twice is an error.
    pub fn register(&mut self, schema: Schema) -> Result<Arc<Schema>, SchemaError> {
        schema.check_declaration()?;
        let reference = schema.reference();
        if self.schemas.contains_key(&reference) {
            return Err(SchemaError::DuplicateSchema(reference));
        }
        debug!(reference = %reference, fields = schema.fields.len(), "Registered schema");
        let schema = Arc::new(schema);
        self.schemas.insert(reference, Arc::clone(&schema));
        Ok(schema)
    }

    /// Parse a YAML schema document and register every schema in it.
    ///
    /// Returns the references that were added.
    pub fn load_document(&mut self, yaml: &str) -> Result<Vec<String>, SchemaError> {
        let document = parse_schema_document(yaml)?;
        let mut added = Vec::with_capacity(document.schemas.len());
        for schema in document.schemas {
            added.push(self.register(schema)?.reference());
        }
        Ok(added)
    }

    /// Look up a schema by reference; the `schema:` prefix is optional
    pub fn get(&self, reference: &str) -> Result<Arc<Schema>, SchemaError> {
        let key = if reference.starts_with("schema:") {
            reference.to_string()
        } else {
            format!("schema:{}", reference)
        };
        self.schemas
            .get(&key)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownSchema(reference.to_string()))
    }

    /// Registered references, sorted
    pub fn available(&self) -> Vec<String> {
        let mut references: Vec<String> = self.schemas.keys().cloned().collect();
        references.sort();
        references
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

const SPECIAL_CHARACTERS: &str = "@$!%*?&";

/// Required email address
pub fn email_field(name: &str) -> FieldDescriptor {
    FieldDescriptor::text(name)
        .label("Email")
        .required()
        .format(TextFormat::Email)
        .message("required", "Email address is required")
        .message("format", "Please enter a valid email address")
}

/// Required person name: 2 to 50 letters or spaces
pub fn name_field(name: &str) -> FieldDescriptor {
    FieldDescriptor::text(name)
        .label("Name")
        .required()
        .min_length(2)
        .max_length(50)
        .pattern(r"^[a-zA-ZäöüÄÖÜß\s]+$")
        .message("required", "Name is required")
        .message("too_short", "Name must be at least 2 characters")
        .message("too_long", "Name must be at most 50 characters")
        .message("pattern", "Name may only contain letters and spaces")
}

/// Required password of at least 8 characters.
///
/// Pair with [`password_complexity`] for the character-class rules.
pub fn password_field(name: &str) -> FieldDescriptor {
    FieldDescriptor::text(name)
        .label("Password")
        .required()
        .min_length(8)
        .message("required", "Password is required")
        .message("too_short", "Password must be at least 8 characters")
}

/// Lowercase, uppercase, digit and special character present; first character from the allowed set
pub fn password_complexity(value: &Value, _record: &Value) -> bool {
    let Some(text) = value.as_str() else {
        return false;
    };
    let allowed = |c: char| c.is_ascii_alphanumeric() || SPECIAL_CHARACTERS.contains(c);
    text.chars().next().map_or(false, allowed)
        && text.chars().any(|c| c.is_ascii_lowercase())
        && text.chars().any(|c| c.is_ascii_uppercase())
        && text.chars().any(|c| c.is_ascii_digit())
        && text.chars().any(|c| SPECIAL_CHARACTERS.contains(c))
}

const PASSWORD_COMPLEXITY_MESSAGE: &str =
    "Password must contain an uppercase letter, a lowercase letter, a number and a special character";

fn avatar_field() -> FieldDescriptor {
    FieldDescriptor::text("avatar")
        .format(TextFormat::Url)
        .allow_empty()
        .message("format", "Please enter a valid avatar URL")
}

fn builtin_schemas() -> Result<Vec<Schema>, SchemaError> {
    let contact_form = Schema::new(
        "contact-form",
        vec![
            name_field("name"),
            email_field("email"),
            FieldDescriptor::text("subject")
                .label("Subject")
                .required()
                .min_length(5)
                .max_length(100),
            FieldDescriptor::text("message")
                .label("Message")
                .required()
                .min_length(10)
                .max_length(1000),
            FieldDescriptor::boolean("consent")
                .label("Consent")
                .required()
                .refine(Refinement::MustBeTrue {
                    message: Some("You must accept the privacy policy".to_string()),
                }),
            FieldDescriptor::text("phone")
                .label("Phone")
                .format(TextFormat::Phone)
                .allow_empty(),
        ],
    )?
    .with_description("Contact form with consent and optional phone number");

    let user = Schema::new(
        "user",
        vec![
            FieldDescriptor::text("id").label("ID").required(),
            name_field("name"),
            email_field("email"),
            avatar_field(),
            FieldDescriptor::date("createdAt").label("Created at").required(),
            FieldDescriptor::date("updatedAt").label("Updated at").required(),
        ],
    )?;

    let create_user = Schema::new(
        "create-user",
        vec![
            name_field("name"),
            email_field("email"),
            password_field("password"),
            avatar_field(),
        ],
    )?
    .with_refinement("password", PASSWORD_COMPLEXITY_MESSAGE, password_complexity)?;

    let login = Schema::new(
        "login",
        vec![
            email_field("email"),
            FieldDescriptor::text("password")
                .label("Password")
                .required()
                .message("required", "Password is required"),
        ],
    )?;

    let product = Schema::new(
        "product",
        vec![
            FieldDescriptor::text("id").label("ID").required(),
            FieldDescriptor::text("name")
                .label("Product name")
                .required()
                .message("required", "Product name is required"),
            FieldDescriptor::text("description")
                .label("Description")
                .required()
                .min_length(10),
            FieldDescriptor::number("price")
                .label("Price")
                .required()
                .positive()
                .message("range", "Price must be positive"),
            FieldDescriptor::text("image")
                .label("Image")
                .required()
                .format(TextFormat::Url)
                .message("format", "Please enter a valid image URL"),
            FieldDescriptor::text("category")
                .label("Category")
                .required()
                .message("required", "Category is required"),
            FieldDescriptor::boolean("inStock").label("In stock").required(),
            FieldDescriptor::array("tags", FieldDescriptor::text("tag")).label("Tags"),
        ],
    )?;

    let pagination = Schema::new(
        "pagination",
        vec![
            FieldDescriptor::number("page").label("Page").required().integer().positive(),
            FieldDescriptor::number("limit")
                .label("Limit")
                .required()
                .integer()
                .positive()
                .range(None, Some(100.0)),
            FieldDescriptor::number("total")
                .label("Total")
                .required()
                .integer()
                .range(Some(0.0), None),
            FieldDescriptor::number("totalPages")
                .label("Total pages")
                .required()
                .integer()
                .range(Some(0.0), None),
        ],
    )?;

    let newsletter = Schema::new(
        "newsletter",
        vec![
            email_field("email"),
            FieldDescriptor::array(
                "categories",
                FieldDescriptor::enumeration("category", ["tech", "design", "business", "lifestyle"]),
            )
            .label("Categories")
            .required()
            .min_length(1)
            .refine(Refinement::UniqueItems { message: None })
            .message("required", "Select at least one category")
            .message("too_short", "Select at least one category"),
        ],
    )?;

    let search = Schema::new(
        "search",
        vec![
            FieldDescriptor::text("query")
                .label("Search term")
                .required()
                .max_length(100)
                .message("required", "Search term is required")
                .message("too_long", "Search term is too long"),
            FieldDescriptor::text("category").label("Category"),
            FieldDescriptor::enumeration("sortBy", ["name", "date", "price", "popularity"])
                .label("Sort by")
                .default_value(json!("name")),
            FieldDescriptor::enumeration("order", ["asc", "desc"])
                .label("Order")
                .default_value(json!("asc")),
        ],
    )?;

    Ok(vec![
        contact_form,
        user,
        create_user,
        login,
        product,
        pagination,
        newsletter,
        search,
    ])
}
