//! Site listing.

use tabled::Tabled;

use unipower_core::Site;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Context;

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl From<&Site> for SiteRow {
    fn from(s: &Site) -> Self {
        Self {
            name: s.name.clone(),
            description: s.description.clone().unwrap_or_default(),
            id: s.id.clone(),
        }
    }
}

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let sites = ctx.engine.get_sites().await?;
    let out = output::render_list(&global.output, &sites, |s: &Site| SiteRow::from(s), |s| s.name.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
