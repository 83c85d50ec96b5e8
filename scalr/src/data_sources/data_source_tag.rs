//! Tag data source implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringNotWhitespace;

use crate::api::tags::{Tag, TagFilter};
use crate::helpers::{api_error, not_configured, Attrs};
use crate::provider_data::ScalrProviderData;

const SUMMARY: &str = "Error retrieving tag";

pub fn tag_data_source_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Retrieves information about a tag")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .description("The identifier of the tag")
                .optional()
                .computed()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("The name of the tag")
                .optional()
                .computed()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("account_id", AttributeType::String)
                .description("The ID of the Scalr account")
                .optional()
                .computed()
                .build(),
        )
        .build()
}

fn single_tag(mut tags: Vec<Tag>, filter: &TagFilter) -> Result<Tag, Diagnostic> {
    match tags.len() {
        0 => Err(Diagnostic::error(
            SUMMARY,
            format!(
                "Could not find tag with ID '{}', name '{}'.",
                filter.id.as_deref().unwrap_or_default(),
                filter.name.as_deref().unwrap_or_default()
            ),
        )),
        1 => Ok(tags.remove(0)),
        _ => Err(Diagnostic::error(
            SUMMARY,
            "Your query returned more than one result. Please try a more specific search criteria.",
        )),
    }
}

#[derive(Default)]
pub struct TagDataSource {
    provider_data: Option<ScalrProviderData>,
}

impl TagDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_tag(&self, ctx: &Context, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let attrs = Attrs(config);
        let filter = TagFilter {
            id: attrs.string("id")?,
            name: attrs.string("name")?,
            account_id: attrs.string("account_id")?.or_else(|| data.account_id.clone()),
        };
        if filter.id.is_none() && filter.name.is_none() {
            return Err(missing_lookup());
        }

        let tags = data
            .client
            .tags()
            .list(ctx, &filter)
            .await
            .map_err(|e| api_error(SUMMARY, &e))?;
        let tag = single_tag(tags, &filter)?;

        let account_id = tag
            .related_id("account")
            .map(str::to_string)
            .or(filter.account_id);
        Ok(DynamicValue::object()
            .with("id", tag.id.as_str())
            .with("name", tag.attributes.name.as_str())
            .with("account_id", Dynamic::from(account_id)))
    }
}

fn missing_lookup() -> Diagnostic {
    Diagnostic::error(
        "Invalid Attribute Combination",
        "At least one of these attributes must be configured: [id, name]",
    )
}

#[async_trait]
impl DataSource for TagDataSource {
    fn type_name(&self) -> &str {
        "scalr_tag"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: tag_data_source_schema(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        match ScalrProviderData::from_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }
        ConfigureDataSourceResponse { diagnostics }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        let set = |name: &str| {
            request
                .config
                .get(&AttributePath::new(name))
                .map(|v| !v.is_null())
                .unwrap_or(false)
        };
        let diagnostics = if set("id") || set("name") {
            vec![]
        } else {
            vec![missing_lookup()]
        };
        ValidateDataSourceConfigResponse { diagnostics }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        match self.read_tag(&ctx, &request.config).await {
            Ok(state) => ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            },
            Err(diag) => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![diag],
            },
        }
    }
}
