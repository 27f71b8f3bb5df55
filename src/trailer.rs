use crate::models::Video;

pub const NO_TRAILER: &str = "No trailers available for this movie.";

fn is_youtube_trailer(video: &Video) -> bool {
    video.site == "YouTube" && video.video_type == "Trailer"
}

/// First YouTube trailer in upstream order. Later matches never win.
pub fn select_trailer(videos: &[Video]) -> Option<&Video> {
    videos.iter().find(|v| is_youtube_trailer(v))
}

pub fn trailers(videos: &[Video]) -> Vec<&Video> {
    videos.iter().filter(|v| is_youtube_trailer(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(key: &str, site: &str, kind: &str) -> Video {
        Video {
            id: format!("v-{key}"),
            key: key.to_string(),
            site: site.to_string(),
            video_type: kind.to_string(),
            name: String::new(),
            official: true,
        }
    }

    #[test]
    fn picks_the_only_matching_entry() {
        let videos = vec![
            video("a", "YouTube", "Teaser"),
            video("b", "Vimeo", "Trailer"),
            video("c", "YouTube", "Trailer"),
            video("d", "YouTube", "Featurette"),
        ];
        assert_eq!(select_trailer(&videos).map(|v| v.key.as_str()), Some("c"));
        assert_eq!(trailers(&videos).len(), 1);
    }

    #[test]
    fn first_trailer_wins() {
        let videos = vec![
            video("first", "YouTube", "Trailer"),
            video("second", "YouTube", "Trailer"),
        ];
        assert_eq!(select_trailer(&videos).unwrap().key, "first");
        let all: Vec<_> = trailers(&videos).iter().map(|v| v.key.clone()).collect();
        assert_eq!(all, vec!["first", "second"]);
    }

    #[test]
    fn nothing_matches() {
        let videos = vec![video("a", "youtube", "trailer"), video("b", "YouTube", "Clip")];
        assert!(select_trailer(&videos).is_none());
        assert!(select_trailer(&[]).is_none());
    }
}
