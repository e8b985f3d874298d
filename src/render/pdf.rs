use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

use super::{Block, Run};
use crate::error::RenderError;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const BODY_SIZE: f32 = 11.0;
const LEADING: f32 = 1.35;
// Average Helvetica glyph width as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.52;
const ANSWER_LINE: &str = "__________________________________________________";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource_name(self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
            Font::Italic => b"F3",
        }
    }
}

#[derive(Debug, Clone)]
struct Span {
    font: Font,
    text: String,
}

#[derive(Debug, Clone)]
struct Line {
    spans: Vec<Span>,
    size: f32,
    x: f32,
    space_before: f32,
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * GLYPH_WIDTH
}

/// Maps text onto WinAnsiEncoding; characters outside it become '?'.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' => c as u8,
            '—' => 0x97,
            '–' => 0x96,
            '•' => 0x95,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '…' => 0x85,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

// Greedy word wrap that keeps each word's font.
fn wrap(spans: &[Span], size: f32, max_width: f32) -> Vec<Vec<Span>> {
    let mut lines: Vec<Vec<Span>> = Vec::new();
    let mut current: Vec<Span> = Vec::new();
    let mut width = 0.0;

    for span in spans {
        for word in span.text.split_whitespace() {
            let word_width = text_width(word, size);
            let space = if current.is_empty() { 0.0 } else { text_width(" ", size) };
            if !current.is_empty() && width + space + word_width > max_width {
                lines.push(std::mem::take(&mut current));
                width = 0.0;
            }
            match current.last_mut() {
                Some(last) if last.font == span.font => {
                    last.text.push(' ');
                    last.text.push_str(word);
                    width += text_width(" ", size) + word_width;
                }
                Some(_) => {
                    current.push(Span { font: span.font, text: format!(" {}", word) });
                    width += text_width(" ", size) + word_width;
                }
                None => {
                    current.push(Span { font: span.font, text: word.to_string() });
                    width = word_width;
                }
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn push_wrapped(out: &mut Vec<Line>, spans: Vec<Span>, size: f32, indent: f32, space_before: f32) {
    let max_width = PAGE_WIDTH - 2.0 * MARGIN - indent;
    for (idx, spans) in wrap(&spans, size, max_width).into_iter().enumerate() {
        out.push(Line {
            spans,
            size,
            x: MARGIN + indent,
            space_before: if idx == 0 { space_before } else { 0.0 },
        });
    }
}

fn push_centered(out: &mut Vec<Line>, font: Font, text: &str, size: f32, space_before: f32) {
    let width = text_width(text, size);
    out.push(Line {
        spans: vec![Span { font, text: text.to_string() }],
        size,
        x: ((PAGE_WIDTH - width) / 2.0).max(MARGIN),
        space_before,
    });
}

fn span(font: Font, text: impl Into<String>) -> Span {
    Span { font, text: text.into() }
}

fn typeset(blocks: &[Block]) -> Vec<Line> {
    let mut lines = Vec::new();
    for block in blocks {
        match block {
            Block::Title(text) => push_centered(&mut lines, Font::Bold, text, 22.0, 0.0),
            Block::Subtitle(text) => push_centered(&mut lines, Font::Regular, text, BODY_SIZE, 4.0),
            Block::NameDateLine => push_wrapped(
                &mut lines,
                vec![
                    span(Font::Bold, "Name:"),
                    span(Font::Regular, "______________________________"),
                    span(Font::Bold, "Date:"),
                    span(Font::Regular, "______________________________"),
                ],
                BODY_SIZE,
                0.0,
                10.0,
            ),
            Block::Heading { level: 1, text } => push_centered(&mut lines, Font::Bold, text, 16.0, 14.0),
            Block::Heading { text, .. } => {
                push_wrapped(&mut lines, vec![span(Font::Bold, text.as_str())], 13.0, 0.0, 10.0)
            }
            Block::Numbered { number, text } => push_wrapped(
                &mut lines,
                vec![span(Font::Regular, format!("{}. {}", number, text))],
                BODY_SIZE,
                18.0,
                2.0,
            ),
            Block::Bullet(text) => push_wrapped(
                &mut lines,
                vec![span(Font::Regular, format!("• {}", text))],
                BODY_SIZE,
                18.0,
                2.0,
            ),
            Block::Instructions(text) => push_wrapped(
                &mut lines,
                vec![span(Font::Bold, "Instructions:"), span(Font::Italic, text.as_str())],
                BODY_SIZE,
                0.0,
                4.0,
            ),
            Block::Paragraph(runs) => {
                let spans = runs
                    .iter()
                    .map(|Run { text, bold }| {
                        span(if *bold { Font::Bold } else { Font::Regular }, text.as_str())
                    })
                    .collect();
                push_wrapped(&mut lines, spans, BODY_SIZE, 0.0, 4.0)
            }
            Block::AnswerLine => {
                push_wrapped(&mut lines, vec![span(Font::Regular, ANSWER_LINE)], BODY_SIZE, 18.0, 6.0)
            }
            Block::Blank => lines.push(Line { spans: Vec::new(), size: BODY_SIZE * 0.5, x: MARGIN, space_before: 0.0 }),
        }
    }
    lines
}

fn paginate(lines: &[Line]) -> Vec<Vec<Operation>> {
    let mut pages: Vec<Vec<Operation>> = Vec::new();
    let mut ops: Vec<Operation> = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        let advance = line.space_before + line.size * LEADING;
        if y - advance < MARGIN && !ops.is_empty() {
            pages.push(std::mem::take(&mut ops));
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= advance;
        if line.spans.is_empty() {
            continue;
        }

        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Td", vec![Object::Real(line.x), Object::Real(y)]));
        for span in &line.spans {
            ops.push(Operation::new(
                "Tf",
                vec![Object::Name(span.font.resource_name().to_vec()), Object::Real(line.size)],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(&span.text), StringFormat::Literal)],
            ));
        }
        ops.push(Operation::new("ET", vec![]));
    }
    if !ops.is_empty() || pages.is_empty() {
        pages.push(ops);
    }
    pages
}

fn font_dictionary(base_font: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Writes the blocks as a Letter-size PDF using the standard Helvetica faces.
pub fn render_pdf(blocks: &[Block]) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(font_dictionary("Helvetica"));
    let bold_id = doc.add_object(font_dictionary("Helvetica-Bold"));
    let italic_id = doc.add_object(font_dictionary("Helvetica-Oblique"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => Object::Reference(regular_id),
            "F2" => Object::Reference(bold_id),
            "F3" => Object::Reference(italic_id),
        },
    });

    let mut page_ids = Vec::new();
    for operations in paginate(&typeset(blocks)) {
        let content = Content { operations };
        let encoded = content.encode().map_err(|e| RenderError::Encoding(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => Object::Reference(resources_id),
            "Contents" => Object::Reference(content_id),
        }));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => page_ids.len() as i64,
        "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<Object>>(),
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(|e| RenderError::Save(e.to_string()))?;
    Ok(buffer)
}
