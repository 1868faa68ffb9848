use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply, reply};

use crate::{
    editor::MapEditor,
    types::{MoveRequest, MoveResponse, Waypoint},
};

const INVALID_COORDINATES: &str = "Invalid Latitude or Longitude";

pub async fn get_status() -> Result<impl Reply, Rejection> {
    Ok(reply::with_status("Ok", StatusCode::OK))
}

pub async fn get_waypoints(editor: Arc<MapEditor>) -> Result<impl Reply, Rejection> {
    Ok(reply::json(&*editor.waypoints()))
}

/// Map click: appends a waypoint and returns the updated list.
pub async fn add_waypoint(
    point: Waypoint,
    editor: Arc<MapEditor>,
) -> Result<impl Reply, Rejection> {
    if !point.is_valid() {
        return Ok(reply::with_status(INVALID_COORDINATES, StatusCode::BAD_REQUEST).into_response());
    }

    editor.click(point);
    Ok(reply::with_status(reply::json(&*editor.waypoints()), StatusCode::CREATED).into_response())
}

/// Marker drag-end: moves every waypoint at `from` to `to`.
pub async fn move_waypoint(
    body: MoveRequest,
    editor: Arc<MapEditor>,
) -> Result<impl Reply, Rejection> {
    if !body.to.is_valid() {
        return Ok(reply::with_status(INVALID_COORDINATES, StatusCode::BAD_REQUEST).into_response());
    }

    let replaced = editor.drag_end(body.from, body.to);
    if replaced == 0 {
        debug!("Drag from {},{} matched no waypoint", body.from.lat, body.from.lng);
    }
    Ok(reply::json(&MoveResponse { replaced }).into_response())
}

pub async fn remove_waypoint(
    index: usize,
    editor: Arc<MapEditor>,
) -> Result<impl Reply, Rejection> {
    match editor.remove(index) {
        Some(point) => Ok(reply::json(&point).into_response()),
        None => Ok(
            reply::with_status("No waypoint at that index", StatusCode::NOT_FOUND).into_response(),
        ),
    }
}

pub async fn get_route(editor: Arc<MapEditor>) -> Result<impl Reply, Rejection> {
    Ok(reply::json(&editor.route()))
}

fn with_editor(
    editor: Arc<MapEditor>,
) -> impl Filter<Extract = (Arc<MapEditor>,), Error = Infallible> + Clone {
    warp::any().map(move || editor.clone())
}

/// The full HTTP API. `max_post_size` caps request bodies in bytes.
pub fn routes(
    editor: Arc<MapEditor>,
    max_post_size: u64,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let status = warp::path!("status")
        .and(warp::get())
        .and_then(get_status);

    let list = warp::path!("waypoints")
        .and(warp::get())
        .and(with_editor(editor.clone()))
        .and_then(get_waypoints);

    let add = warp::path!("waypoints")
        .and(warp::post())
        .and(warp::body::content_length_limit(max_post_size))
        .and(warp::body::json())
        .and(with_editor(editor.clone()))
        .and_then(add_waypoint);

    let drag = warp::path!("waypoints")
        .and(warp::put())
        .and(warp::body::content_length_limit(max_post_size))
        .and(warp::body::json())
        .and(with_editor(editor.clone()))
        .and_then(move_waypoint);

    let remove = warp::path!("waypoints" / usize)
        .and(warp::delete())
        .and(with_editor(editor.clone()))
        .and_then(remove_waypoint);

    let route = warp::path!("route")
        .and(warp::get())
        .and(with_editor(editor))
        .and_then(get_route);

    status
        .or(list)
        .or(add)
        .or(drag)
        .or(remove)
        .or(route)
        .with(warp::trace::request())
}
