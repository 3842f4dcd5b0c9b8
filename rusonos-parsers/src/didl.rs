//! DIDL-Lite metadata parsing.
//!
//! DIDL-Lite is the cut-down MPEG-21 schema UPnP uses for content metadata.
//! Sonos wraps track metadata in it everywhere: queue listings, transport
//! events, position info. Only the fields this library consumes are kept;
//! the full schema is much larger.

use xmltree::Element;

use crate::error::{ParseError, Result};

/// One `<res>` resource of a DIDL item: a playable URI plus transport hints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DidlResource {
    pub uri: String,
    pub protocol_info: Option<String>,
    /// Track duration in `H:MM:SS` form, when the resource carries one.
    pub duration: Option<String>,
}

/// One DIDL-Lite item or container.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DidlItem {
    pub id: String,
    pub parent_id: String,
    /// The UPnP class, e.g. `object.item.audioItem.musicTrack`.
    pub item_class: String,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub original_track_number: Option<u32>,
    pub res: Vec<DidlResource>,
}

/// Parse a DIDL-Lite document into its items.
///
/// Accepts both `<item>` and `<container>` children. Any other child of the
/// DIDL-Lite root is rejected: the schema allows `<desc>` there, but Sonos
/// never produces it, so it is treated as a sign of corrupt metadata.
pub fn parse_didl(xml: &str) -> Result<Vec<DidlItem>> {
    let root = Element::parse(xml.as_bytes()).map_err(|e| ParseError::Xml(e.to_string()))?;

    let mut items = Vec::new();
    for child in root.children.iter().filter_map(|node| node.as_element()) {
        if child.name != "item" && child.name != "container" {
            return Err(ParseError::IllegalDidlChild(child.name.clone()));
        }
        items.push(parse_item(child)?);
    }
    Ok(items)
}

fn parse_item(element: &Element) -> Result<DidlItem> {
    let mut item = DidlItem {
        id: element.attributes.get("id").cloned().unwrap_or_default(),
        parent_id: element
            .attributes
            .get("parentID")
            .cloned()
            .unwrap_or_default(),
        ..DidlItem::default()
    };

    for child in element.children.iter().filter_map(|node| node.as_element()) {
        let text = child.get_text().map(|t| t.into_owned());
        match child.name.as_str() {
            "class" => {
                item.item_class = text.ok_or_else(|| {
                    ParseError::Malformed("DIDL item with empty upnp:class".to_string())
                })?;
            }
            "title" => item.title = text,
            "creator" => item.creator = text,
            "album" => item.album = text,
            "albumArtURI" => item.album_art_uri = text,
            "originalTrackNumber" => {
                item.original_track_number = text.and_then(|t| t.trim().parse().ok());
            }
            "res" => {
                item.res.push(DidlResource {
                    uri: text.unwrap_or_default(),
                    protocol_info: child.attributes.get("protocolInfo").cloned(),
                    duration: child.attributes.get("duration").cloned(),
                });
            }
            // streamContent, radioShowMd, albumArtist and friends are not
            // consumed anywhere yet.
            _ => {}
        }
    }

    if item.item_class.is_empty() {
        return Err(ParseError::Malformed(
            "DIDL item without upnp:class".to_string(),
        ));
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &str = r#"<?xml version="1.0"?>
<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">
  <item id="-1" parentID="-1" restricted="true">
    <res protocolInfo="x-file-cifs:*:application/ogg:*" duration="0:07:36">x-file-cifs://tywin/music/afro_celt_sound_system-1999-volume_2_release/01.release.ogg</res>
    <r:streamContent/>
    <r:radioShowMd/>
    <upnp:albumArtURI>/getaa?u=x-file-cifs%3a%2f%2ftywin%2fmusic%2fafro_celt_sound_system-1999-volume_2_release%2f01.release.ogg&amp;v=175</upnp:albumArtURI>
    <dc:title>Release</dc:title>
    <upnp:class>object.item.audioItem.musicTrack</upnp:class>
    <dc:creator>Afro Celt Sound System</dc:creator>
    <upnp:album>Volume 2: Release</upnp:album>
    <upnp:originalTrackNumber>1</upnp:originalTrackNumber>
    <r:albumArtist>Afro Celt Sound System</r:albumArtist>
  </item>
</DIDL-Lite>
"#;

    #[test]
    fn parses_a_music_track() {
        let items = parse_didl(TRACK).unwrap();
        assert_eq!(items.len(), 1);

        let track = &items[0];
        assert_eq!(track.item_class, "object.item.audioItem.musicTrack");
        assert_eq!(track.title.as_deref(), Some("Release"));
        assert_eq!(track.creator.as_deref(), Some("Afro Celt Sound System"));
        assert_eq!(track.album.as_deref(), Some("Volume 2: Release"));
        assert_eq!(track.original_track_number, Some(1));
        assert_eq!(track.res.len(), 1);
        assert_eq!(track.res[0].duration.as_deref(), Some("0:07:36"));
        assert!(track.res[0].uri.starts_with("x-file-cifs://tywin/music/"));
    }

    #[test]
    fn missing_restricted_attribute_is_fine() {
        // Some services omit restricted="true"; that must not matter.
        let xml = TRACK.replace(" restricted=\"true\"", "");
        let items = parse_didl(&xml).unwrap();
        assert_eq!(items[0].creator.as_deref(), Some("Afro Celt Sound System"));
    }

    #[test]
    fn containers_are_accepted() {
        let xml = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">
  <container id="A:ALBUM/x" parentID="A:ALBUM" restricted="true">
    <dc:title>Volume 2: Release</dc:title>
    <upnp:class>object.container.album.musicAlbum</upnp:class>
  </container>
</DIDL-Lite>"#;

        let items = parse_didl(xml).unwrap();
        assert_eq!(items[0].item_class, "object.container.album.musicAlbum");
        assert_eq!(items[0].id, "A:ALBUM/x");
    }

    #[test]
    fn illegal_top_level_child_is_rejected() {
        let xml = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">
  <desc id="x" nameSpace="urn:x">opaque</desc>
</DIDL-Lite>"#;

        match parse_didl(xml) {
            Err(ParseError::IllegalDidlChild(name)) => assert_eq!(name, "desc"),
            other => panic!("expected IllegalDidlChild, got {other:?}"),
        }
    }

    #[test]
    fn item_without_class_is_rejected() {
        let xml = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">
  <item id="-1" parentID="-1"><dc:title>x</dc:title></item>
</DIDL-Lite>"#;

        assert!(matches!(parse_didl(xml), Err(ParseError::Malformed(_))));
    }
}
