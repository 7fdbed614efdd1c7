// HTML pages for the web front end.
// Every user- or model-supplied string goes through `escape_html`.

use crate::models::{DetectionResult, SignalSource, VideoDetection};

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:860px;margin:2rem auto;padding:0 1rem;color:#222}\
form{margin:1rem 0 2rem}textarea{width:100%;height:8rem}\
.bar{background:#eee;border-radius:4px;height:18px}.fill{height:18px;border-radius:4px}\
.ai{background:#d9534f}.real{background:#5cb85c}.error{color:#a94442;background:#f2dede;padding:.6rem}\
table{border-collapse:collapse}td,th{padding:.2rem .8rem;border-bottom:1px solid #ddd;text-align:left}\
.reasoning{white-space:pre-wrap;background:#f7f7f7;padding:.8rem}img,video{max-width:100%}";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Score as a display percentage, clamped to [0, 100].
pub fn clamp_percent(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        (score * 100.0).clamp(0.0, 100.0)
    }
}

fn percent_str(score: f64) -> String {
    format!("{:.2}%", clamp_percent(score))
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>{title} - TruthLens</title>\
<style>{style}</style></head><body><h1>{title}</h1>{body}<p><a href=\"/\">Analyze something else</a></p></body></html>",
        title = escape_html(title),
        style = STYLE,
        body = body,
    )
}

fn score_block(result: &DetectionResult, label: &str) -> String {
    let pct = clamp_percent(result.final_score);
    let class = if result.is_ai { "ai" } else { "real" };
    format!(
        "<h2>{label}: {pct:.2}%</h2><div class=\"bar\"><div class=\"fill {class}\" style=\"width:{pct:.2}%\"></div></div>\
<p><strong>Verdict:</strong> {verdict}</p>",
        label = label,
        pct = pct,
        class = class,
        verdict = escape_html(result.verdict_label()),
    )
}

fn component_rows(result: &DetectionResult, rows: &[(SignalSource, &str)]) -> String {
    let cells: String = rows
        .iter()
        .map(|(source, name)| {
            let fallback = result.component(*source).map_or(false, |s| s.fallback);
            format!(
                "<tr><td>{}</td><td>{}{}</td></tr>",
                name,
                percent_str(result.component_value(*source)),
                if fallback { " (neutral default)" } else { "" }
            )
        })
        .collect();
    format!("<table><tr><th>Signal</th><th>Score</th></tr>{}</table>", cells)
}

fn error_block(result: &DetectionResult) -> String {
    match result.error {
        Some(ref msg) => format!("<p class=\"error\">{}</p>", escape_html(msg)),
        None => String::new(),
    }
}

fn reasoning_block(reasoning: &str) -> String {
    if reasoning.is_empty() {
        return String::new();
    }
    format!("<h3>Reasoning</h3><div class=\"reasoning\">{}</div>", escape_html(reasoning))
}

pub fn index_page() -> String {
    layout(
        "AI Media Detector",
        "<h2>Text or article URL</h2>\
<form method=\"post\" action=\"/analyze_text\"><textarea name=\"text_input\" placeholder=\"Paste text or a URL\"></textarea>\
<button type=\"submit\">Analyze text</button></form>\
<h2>Image</h2>\
<form method=\"post\" action=\"/analyze_image\" enctype=\"multipart/form-data\">\
<input type=\"file\" name=\"image_file\" accept=\"image/*\"><button type=\"submit\">Analyze image</button></form>\
<h2>Video</h2>\
<form method=\"post\" action=\"/analyze_video\" enctype=\"multipart/form-data\">\
<input type=\"file\" name=\"video_file\" accept=\"video/*\"><button type=\"submit\">Analyze video</button></form>",
    )
}

pub fn text_result_page(input: &str, result: &DetectionResult) -> String {
    let body = format!(
        "{error}<h3>Input</h3><div class=\"reasoning\">{input}</div>{score}{components}{reasoning}",
        error = error_block(result),
        input = escape_html(input),
        score = score_block(result, "AI likelihood"),
        components = component_rows(
            result,
            &[
                (SignalSource::Classifier, "Text classifier"),
                (SignalSource::Judge, "Judge model"),
                (SignalSource::Heuristic, "Heuristic signals"),
            ],
        ),
        reasoning = reasoning_block(&result.reasoning),
    );
    layout("Text analysis", &body)
}

pub fn image_result_page(image_url: &str, result: &DetectionResult) -> String {
    let body = format!(
        "{error}<img src=\"{src}\" alt=\"uploaded image\">{score}{components}{reasoning}",
        error = error_block(result),
        src = escape_html(image_url),
        score = score_block(result, "AI likelihood"),
        components = component_rows(
            result,
            &[
                (SignalSource::Classifier, "Image classifier"),
                (SignalSource::Judge, "Judge model"),
            ],
        ),
        reasoning = reasoning_block(&result.reasoning),
    );
    layout("Image analysis", &body)
}

pub fn video_result_page(video_url: &str, video: &VideoDetection) -> String {
    let result = &video.result;
    let frame_rows: String = video
        .frames
        .iter()
        .map(|f| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                f.frame_index + 1,
                percent_str(f.result.final_score),
                escape_html(f.result.verdict_label())
            )
        })
        .collect();
    let frames_table = if frame_rows.is_empty() {
        String::new()
    } else {
        format!(
            "<h3>Frames ({} extracted, {} over threshold)</h3>\
<table><tr><th>Frame</th><th>Score</th><th>Verdict</th></tr>{}</table>",
            video.frames_extracted, video.high_scoring_frames, frame_rows
        )
    };
    let body = format!(
        "{error}<video src=\"{src}\" controls></video>{score}{components}{frames}{reasoning}",
        error = error_block(result),
        src = escape_html(video_url),
        score = score_block(result, "Average AI likelihood"),
        components = component_rows(result, &[(SignalSource::Judge, "Judge model (frame mean)")]),
        frames = frames_table,
        reasoning = reasoning_block(&result.reasoning),
    );
    layout("Video analysis", &body)
}

/// Page for requests that never reached analysis (bad upload, missing field).
pub fn error_page(message: &str) -> String {
    layout("Analysis failed", &format!("<p class=\"error\">{}</p>", escape_html(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentScores, Modality, ScoreSample};

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(clamp_percent(0.25), 25.0);
        assert_eq!(clamp_percent(1.7), 100.0);
        assert_eq!(clamp_percent(-0.3), 0.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
    }

    #[test]
    fn test_text_page_escapes_input_and_marks_fallback() {
        let mut components = ComponentScores::new();
        components.insert(SignalSource::Classifier, ScoreSample::new(SignalSource::Classifier, 0.9));
        components.insert(SignalSource::Judge, ScoreSample::neutral(SignalSource::Judge));
        components.insert(SignalSource::Heuristic, ScoreSample::new(SignalSource::Heuristic, 0.2));
        let result = DetectionResult::new(Modality::Text, 0.695, components, "why".to_string());
        let html = text_result_page("<b>hi</b>", &result);
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(html.contains("AI likelihood: 69.50%"));
        assert!(html.contains("50.00% (neutral default)"));
        assert!(html.contains("likely AI-generated"));
    }

    #[test]
    fn test_placeholder_shows_error() {
        let result = DetectionResult::placeholder(Modality::Image, "Not a readable image: x");
        let html = image_result_page("/uploads/a.png", &result);
        assert!(html.contains("class=\"error\">Not a readable image: x"));
        assert!(html.contains("AI likelihood: 0.00%"));
    }
}
