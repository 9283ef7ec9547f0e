#[cfg(test)]
#[path = "chrome_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::Browser;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time;

use super::memory::Document;
use crate::domain::models::Host;
use crate::domain::models::HostMarkup;
use crate::domain::models::HostName;
use crate::domain::models::InputEdit;
use crate::domain::models::NodeId;
use crate::domain::models::NodeSpec;
use crate::domain::models::Selector;
use crate::domain::models::TextSurfaceDriver;
use crate::domain::models::Tree;

pub struct ChromeOptions {
    pub devtools_url: String,
    /// Substring of the URL of the page to attach to.
    pub page_match: String,
    pub mirror_interval: Duration,
}

/// Serializes every container on the page into `NodeSpec` JSON.
fn snapshot_script(container: &Selector) -> Result<String> {
    let selector = serde_json::to_string(&container.to_string())?;
    return Ok(format!(
        r#"(() => {{
  const snap = (node) => {{
    if (node.nodeType === Node.TEXT_NODE) {{
      return {{ kind: "text", text: node.textContent }};
    }}
    if (node.nodeType !== Node.ELEMENT_NODE) {{
      return null;
    }}
    const attributes = {{}};
    for (const attr of node.attributes) {{
      attributes[attr.name] = attr.value;
    }}
    const children = Array.from(node.childNodes).map(snap).filter((e) => e !== null);
    return {{ kind: "element", tag: node.tagName.toLowerCase(), attributes, children }};
  }};
  return JSON.stringify(Array.from(document.querySelectorAll({selector})).map(snap));
}})()"#
    ));
}

/// Wraps `body` so it runs against the first element matching `selector`. The script
/// evaluates to `false` when nothing matches.
pub fn element_script(selector: &Selector, body: &str) -> Result<String> {
    let selector = serde_json::to_string(&selector.to_string())?;
    return Ok(format!(
        "(() => {{ const el = document.querySelector({selector}); if (!el) {{ return false; }} {body} return true; }})()"
    ));
}

/// A container copied into the local document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mirrored {
    pub node: NodeId,
    /// Serialized markup it was last copied from.
    pub fingerprint: String,
}

/// Applies a page snapshot to the local mirror. New containers are appended in one batch,
/// containers whose markup changed get their children replaced in place. Containers that
/// left the page stay, the host virtualizes long conversations. `mirrored` indexes the
/// copied containers by key. Returns how many containers were added or updated.
pub fn mirror_containers(
    document: &Document,
    key_attribute: &str,
    specs: Vec<NodeSpec>,
    mirrored: &mut HashMap<String, Mirrored>,
) -> Result<usize> {
    let mut added = vec![];
    let mut added_keys: Vec<(String, String)> = vec![];
    let mut updated = 0;

    for spec in specs {
        let key = match spec.attribute(key_attribute) {
            Some(key) => key.to_string(),
            None => continue,
        };
        let fingerprint = serde_json::to_string(&spec)?;

        let entry = match mirrored.get_mut(&key) {
            Some(entry) => entry,
            None => {
                if !added_keys.iter().any(|(e, _)| return *e == key) {
                    added_keys.push((key, fingerprint));
                    added.push(spec);
                }
                continue;
            }
        };
        if entry.fingerprint == fingerprint {
            continue;
        }

        if let NodeSpec::Element {
            attributes,
            children,
            ..
        } = spec
        {
            for (name, value) in attributes.iter() {
                document.set_attribute(entry.node, name, value)?;
            }
            document.replace_children(entry.node, children)?;
            entry.fingerprint = fingerprint;
            updated += 1;
        }
    }

    let count = added.len() + updated;
    if !added.is_empty() {
        let nodes = document.append_many(document.root(), added)?;
        for (node, (key, fingerprint)) in nodes.into_iter().zip(added_keys) {
            mirrored.insert(key, Mirrored { node, fingerprint });
        }
    }

    return Ok(count);
}

async fn snapshot(page: &Page, script: &str) -> Result<Vec<NodeSpec>> {
    let json = page.evaluate(script.to_string()).await?.into_value::<String>()?;
    return Ok(serde_json::from_str::<Vec<NodeSpec>>(&json)?);
}

async fn find_page(browser: &Browser, page_match: &str) -> Result<Page> {
    for page in browser.pages().await? {
        if let Ok(Some(url)) = page.url().await {
            if url.contains(page_match) {
                tracing::info!(url, "Attaching to page");
                return Ok(page);
            }
        }
    }

    bail!(format!("No page with a URL containing '{page_match}' was found"));
}

struct Mirror {
    page: Page,
    document: Arc<Document>,
    key_attribute: String,
    script: String,
    mirrored: HashMap<String, Mirrored>,
}

impl Mirror {
    async fn sync(&mut self) -> Result<usize> {
        let specs = snapshot(&self.page, &self.script).await?;
        return mirror_containers(
            &self.document,
            &self.key_attribute,
            specs,
            &mut self.mirrored,
        );
    }

    async fn start(mut self, browser: Browser, every: Duration) {
        let _browser = browser;
        let mut ticker = time::interval_at(time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.sync().await {
                Ok(0) => {}
                Ok(count) => tracing::trace!(count, "Mirrored containers"),
                Err(err) => tracing::warn!(err = ?err, "Failed to mirror page"),
            }
        }
    }
}

/// Attaches to a Chromium based host over the DevTools protocol. The page's containers are
/// mirrored into a local `Document` and prompts are typed into the page itself.
pub async fn build(options: ChromeOptions, markup: HostMarkup) -> Result<Host> {
    let (browser, mut handler) = Browser::connect(options.devtools_url.to_string())
        .await
        .map_err(|err| {
            return anyhow!(
                "Failed to connect to DevTools at {}: {err}",
                options.devtools_url
            );
        })?;

    let handler_task = tokio::spawn(async move {
        while let Some(res) = handler.next().await {
            if let Err(err) = res {
                tracing::warn!(err = ?err, "DevTools connection failed");
                break;
            }
        }
        tracing::debug!("DevTools handler ended");
    });

    let page = match find_page(&browser, &options.page_match).await {
        Ok(page) => page,
        Err(err) => {
            handler_task.abort();
            return Err(err);
        }
    };

    let document = Arc::new(Document::default());
    let mut mirror = Mirror {
        page: page.clone(),
        document: document.clone(),
        key_attribute: markup.key_attribute.to_string(),
        script: snapshot_script(&markup.container)?,
        mirrored: HashMap::new(),
    };

    // Containers already on the page have to be present before the agent scans.
    let count = mirror.sync().await?;
    tracing::info!(count, "Mirrored existing containers");
    let mirror_task = tokio::spawn(mirror.start(browser, options.mirror_interval));

    let surface = ChromeSurface { page, markup };
    return Ok(Host::new(HostName::Chrome, document, Arc::new(surface))
        .with_task(handler_task)
        .with_task(mirror_task));
}

pub struct ChromeSurface {
    page: Page,
    markup: HostMarkup,
}

impl ChromeSurface {
    async fn on_input(&self, body: &str) -> Result<()> {
        let script = element_script(&self.markup.prompt_input, body)?;
        if !self.page.evaluate(script).await?.into_value::<bool>()? {
            bail!("Could not find prompt input surface");
        }

        return Ok(());
    }
}

#[async_trait]
impl TextSurfaceDriver for ChromeSurface {
    #[allow(clippy::implicit_return)]
    async fn focus(&self) -> Result<()> {
        return self.on_input("el.focus();").await;
    }

    #[allow(clippy::implicit_return)]
    async fn select_all(&self) -> Result<()> {
        return self
            .on_input(
                "const range = document.createRange(); range.selectNodeContents(el); const sel = window.getSelection(); sel.removeAllRanges(); sel.addRange(range);",
            )
            .await;
    }

    #[allow(clippy::implicit_return)]
    async fn dispatch_edit(&self, edit: InputEdit) -> Result<()> {
        let input_type = serde_json::to_string(edit.input_type())?;
        let data = serde_json::to_string(&edit.data())?;
        let body = format!(
            "el.dispatchEvent(new InputEvent('beforeinput', {{ inputType: {input_type}, data: {data}, bubbles: true, cancelable: true }}));"
        );
        return self.on_input(&body).await;
    }

    #[allow(clippy::implicit_return)]
    async fn submit(&self) -> Result<()> {
        let script = element_script(&self.markup.submit_control, "el.click();")?;
        if !self.page.evaluate(script).await?.into_value::<bool>()? {
            bail!("Could not find submit control");
        }

        return Ok(());
    }
}
