use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::{
    GetDocumentParams, Node, NodeId, QuerySelectorParams, ResolveNodeParams,
};
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::js_protocol::runtime::{
    CallFunctionOnParams, ExceptionDetails, RemoteObjectId,
};
use tokio::sync::Mutex;
use tracing::trace;

use super::driver::{DriverError, Locator, PageDriver};
use super::session::BrowserSession;

/// How often bounded waits re-query the document.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// [`PageDriver`] backed by raw DevTools commands against a
/// [`BrowserSession`] page.
///
/// Every lookup re-fetches the pierced document tree and resolves the
/// selector from there, so node ids never go stale while the login form
/// re-renders between steps.
pub struct CdpDriver {
    session: BrowserSession,
    frame: Mutex<Option<String>>,
}

impl CdpDriver {
    pub fn new(session: BrowserSession) -> Self {
        Self {
            session,
            frame: Mutex::new(None),
        }
    }

    /// Root node id for selector queries: the top document, or the active
    /// frame's content document.
    async fn query_root(&self) -> Result<NodeId, DriverError> {
        let frame = self.frame.lock().await.clone();
        let document = self
            .session
            .page()
            .execute(GetDocumentParams {
                depth: Some(-1),
                pierce: Some(true),
            })
            .await?;

        match frame {
            None => Ok(document.root.node_id.clone()),
            Some(name) => {
                frame_document(&document.root, &name).ok_or(DriverError::FrameGone(name))
            }
        }
    }

    async fn find_node(&self, locator: &Locator) -> Result<Option<NodeId>, DriverError> {
        let root = self.query_root().await?;
        let found = self
            .session
            .page()
            .execute(QuerySelectorParams::new(root, locator.css))
            .await?;

        // The protocol reports "no match" as node id zero.
        if *found.node_id.inner() == 0 {
            Ok(None)
        } else {
            Ok(Some(found.node_id.clone()))
        }
    }

    async fn require_node(&self, locator: &Locator) -> Result<NodeId, DriverError> {
        self.find_node(locator)
            .await?
            .ok_or_else(|| DriverError::NotFound(locator.to_string()))
    }

    async fn node_object(&self, node_id: NodeId) -> Result<RemoteObjectId, DriverError> {
        let resolved = self
            .session
            .page()
            .execute(ResolveNodeParams {
                node_id: Some(node_id),
                backend_node_id: None,
                object_group: None,
                execution_context_id: None,
            })
            .await?;

        resolved
            .object
            .object_id
            .clone()
            .ok_or_else(|| DriverError::Script("node did not resolve to an object".to_string()))
    }

    /// Run `function` with `this` bound to the element behind `object_id`,
    /// inside that element's own frame.
    async fn call_on(
        &self,
        object_id: RemoteObjectId,
        function: &str,
    ) -> Result<Option<serde_json::Value>, DriverError> {
        let params = CallFunctionOnParams::builder()
            .object_id(object_id)
            .function_declaration(function)
            .return_by_value(true)
            .build()
            .map_err(DriverError::Script)?;

        let response = self.session.page().execute(params).await?;
        if let Some(details) = &response.exception_details {
            return Err(DriverError::Script(exception_message(details)));
        }
        Ok(response.result.result.value.clone())
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        trace!(url, "navigating");
        self.session.page().goto(url).await?;
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), DriverError> {
        let start = Instant::now();
        loop {
            match self.find_node(locator).await {
                Ok(Some(_)) => return Ok(()),
                // A re-render can briefly detach the frame document; treat it
                // like an absent element and keep polling.
                Ok(None) | Err(DriverError::FrameGone(_)) => {}
                Err(err) => return Err(err),
            }

            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout {
                    what: locator.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, locator: &Locator) -> Result<(), DriverError> {
        let node_id = self.require_node(locator).await?;
        let object_id = self.node_object(node_id).await?;
        self.call_on(object_id, "function() { this.click(); }")
            .await?;
        trace!(%locator, "clicked");
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        let node_id = self.require_node(locator).await?;
        let object_id = self.node_object(node_id).await?;

        // Select any existing content so the inserted text replaces it and
        // the page sees a real typed input event.
        self.call_on(
            object_id,
            "function() { this.focus(); if (this.select) { this.select(); } }",
        )
        .await?;
        self.session
            .page()
            .execute(InsertTextParams::new(text))
            .await?;
        trace!(%locator, "filled");
        Ok(())
    }

    async fn read_text(&self, locator: &Locator) -> Result<String, DriverError> {
        let node_id = self.require_node(locator).await?;
        let object_id = self.node_object(node_id).await?;
        let value = self
            .call_on(
                object_id,
                "function() { return this.innerText || this.textContent || \"\"; }",
            )
            .await?;

        match value {
            Some(serde_json::Value::String(text)) => Ok(text),
            _ => Ok(String::new()),
        }
    }

    async fn eval(&self, expression: &str) -> Result<serde_json::Value, DriverError> {
        let result = self.session.page().evaluate(expression).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn enter_frame(&self, name: &str, timeout: Duration) -> Result<(), DriverError> {
        let start = Instant::now();
        loop {
            let document = self
                .session
                .page()
                .execute(GetDocumentParams {
                    depth: Some(-1),
                    pierce: Some(true),
                })
                .await?;

            if frame_document(&document.root, name).is_some() {
                *self.frame.lock().await = Some(name.to_string());
                trace!(frame = name, "entered frame");
                return Ok(());
            }

            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout {
                    what: format!("frame {name:?}"),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn leave_frame(&self) {
        *self.frame.lock().await = None;
    }

    async fn close(&self) {
        self.session.close().await;
    }
}

/// Depth-first search of the pierced node tree for an iframe named `name`,
/// returning the node id of its content document.
fn frame_document(node: &Node, name: &str) -> Option<NodeId> {
    if node.node_name.eq_ignore_ascii_case("iframe") && attribute(node, "name") == Some(name) {
        if let Some(document) = node.content_document.as_deref() {
            return Some(document.node_id.clone());
        }
    }

    for child in node.children.iter().flatten() {
        if let Some(found) = frame_document(child, name) {
            return Some(found);
        }
    }
    for shadow_root in node.shadow_roots.iter().flatten() {
        if let Some(found) = frame_document(shadow_root, name) {
            return Some(found);
        }
    }
    if let Some(document) = node.content_document.as_deref() {
        if let Some(found) = frame_document(document, name) {
            return Some(found);
        }
    }

    None
}

/// Attribute value from a node's flattened name/value attribute list.
fn attribute<'a>(node: &'a Node, name: &str) -> Option<&'a str> {
    node.attributes
        .as_ref()?
        .chunks_exact(2)
        .find(|pair| pair[0] == name)
        .map(|pair| pair[1].as_str())
}

fn exception_message(details: &ExceptionDetails) -> String {
    details
        .exception
        .as_ref()
        .and_then(|exception| exception.description.clone())
        .unwrap_or_else(|| details.text.clone())
}
