use anyhow::{Context, Result};
use serde::Serialize;
use tinytemplate::{TinyTemplate, format_unescaped};

/// Render a directive template. Values are substituted verbatim.
pub fn render<T: Serialize>(template: &str, ctx: &T) -> Result<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template("tpl", template)
        .context("invalid directive template")?;

    // 渲染模板
    let content = tt.render("tpl", ctx).context("failed to render directive template")?;
    Ok(content)
}
