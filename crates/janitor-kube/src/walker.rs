//! Paged streaming over namespaces and dynamic resources
//!
//! Both walkers follow the server's continue token, yielding objects in
//! server order. Dropping the stream (or returning early from the consuming
//! loop) aborts the traversal, which is the streaming rendering of the
//! "callback error aborts" contract.

use std::collections::VecDeque;
use std::fmt::Debug;

use futures::Stream;
use k8s_openapi::api::core::v1::Namespace;
use kube::Client;
use kube::api::{Api, DynamicObject, ListParams};
use kube::discovery::ApiResource;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Default number of items per list page.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

struct PageState<K> {
    api: Api<K>,
    params: ListParams,
    buffered: VecDeque<K>,
    finished: bool,
}

/// Stream every object behind a paged list call.
pub fn paged<K>(api: Api<K>, selector: &str, page_limit: u32) -> impl Stream<Item = Result<K>>
where
    K: Clone + DeserializeOwned + Debug,
{
    let mut params = ListParams::default().limit(page_limit);
    if !selector.is_empty() {
        params = params.labels(selector);
    }

    let state = PageState {
        api,
        params,
        buffered: VecDeque::new(),
        finished: false,
    };

    futures::stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.buffered.pop_front() {
                return Ok(Some((item, state)));
            }
            if state.finished {
                return Ok(None);
            }

            let page = state.api.list(&state.params).await?;
            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => state.params.continue_token = Some(token),
                _ => state.finished = true,
            }
            state.buffered.extend(page.items);
        }
    })
}

/// Stream the namespaces matching a compiled label selector.
pub fn namespaces(
    client: &Client,
    selector: &str,
    page_limit: u32,
) -> impl Stream<Item = Result<Namespace>> {
    paged(Api::all(client.clone()), selector, page_limit)
}

/// Stream a GVR's objects, cluster-wide when `namespace` is empty.
pub fn objects(
    client: &Client,
    resource: &ApiResource,
    namespace: &str,
    selector: &str,
    page_limit: u32,
) -> impl Stream<Item = Result<DynamicObject>> {
    let api: Api<DynamicObject> = if namespace.is_empty() {
        Api::all_with(client.clone(), resource)
    } else {
        Api::namespaced_with(client.clone(), namespace, resource)
    };
    paged(api, selector, page_limit)
}
